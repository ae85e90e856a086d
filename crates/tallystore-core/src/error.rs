//! Core error types.

use thiserror::Error;

/// Errors raised while updating or collecting metrics.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store could not be reached or failed an operation.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Unrecognized update command.
    #[error("invalid update command: {0}")]
    InvalidCommand(String),

    /// The metadata record of a discovered metric is missing or unparsable.
    #[error("corrupt metadata for '{key}': {reason}")]
    CorruptMetadata {
        /// Storage key of the affected metric.
        key: String,
        /// What was wrong with the record.
        reason: String,
    },

    /// A stored field key or field value could not be decoded.
    #[error("corrupt field {field} in '{key}': {reason}")]
    CorruptField {
        /// Storage key of the affected metric.
        key: String,
        /// Raw field name.
        field: String,
        /// What was wrong with the field.
        reason: String,
    },

    /// A numeric operation hit a field holding non-numeric text.
    #[error("field {field} in '{key}' does not hold a number of the requested type")]
    WrongFieldType {
        /// Storage key.
        key: String,
        /// Raw field name.
        field: String,
    },

    /// Label values do not line up with the declared label names.
    #[error("metric '{metric}' declares {expected} labels but {actual} values were given")]
    LabelMismatch {
        /// Metric name.
        metric: String,
        /// Number of declared label names.
        expected: usize,
        /// Number of label values supplied.
        actual: usize,
    },

    /// The update value cannot be applied with the requested command.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error is a store failure rather than a problem with one metric.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_))
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}
