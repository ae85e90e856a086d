//! Store abstraction used by the updater and the collector.

use std::collections::BTreeMap;

use crate::error::Error;

/// A key-value store offering hash records and sets with atomic single-field
/// operations.
///
/// Every method touches exactly one field or one set member; implementations
/// must make each call atomic with respect to concurrent calls on the same
/// field. Nothing here spans several fields, and callers never assume it does.
///
/// Numbers are stored as decimal text: integer increments keep an integer,
/// float increments and sets keep the shortest round-trip float text.
pub trait MetricStore: Send + Sync {
    /// Add `delta` to an integer field, creating it at zero. Returns the new value.
    fn increment_integer(&self, key: &str, field: &str, delta: i64) -> Result<i64, Error>;

    /// Add `delta` to a float field, creating it at zero. Returns the new value.
    fn increment_float(&self, key: &str, field: &str, delta: f64) -> Result<f64, Error>;

    /// Unconditionally set a field. Returns `true` if the field did not exist.
    fn set_field(&self, key: &str, field: &str, value: &str) -> Result<bool, Error>;

    /// Read every field of a record. A missing record reads as empty.
    fn read_fields(&self, key: &str) -> Result<BTreeMap<String, String>, Error>;

    /// Add a member to a set. Returns `true` if it was not present.
    fn add_member(&self, set: &str, member: &str) -> Result<bool, Error>;

    /// List the members of a set. A missing set reads as empty.
    fn members(&self, set: &str) -> Result<Vec<String>, Error>;

    /// Delete every record whose key starts with `prefix`.
    ///
    /// Returns the number of fields removed.
    fn remove_records_with_prefix(&self, prefix: &str) -> Result<usize, Error>;

    /// Delete a whole set. Returns the number of members removed.
    fn remove_set(&self, set: &str) -> Result<usize, Error>;

    /// Persist buffered writes, for stores that buffer.
    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Render a float the way stores keep it.
pub(crate) fn format_number(value: f64) -> String {
    value.to_string()
}

/// Parse a stored integer field.
pub(crate) fn parse_integer(key: &str, field: &str, raw: &str) -> Result<i64, Error> {
    raw.parse::<i64>().map_err(|_| Error::WrongFieldType {
        key: key.to_string(),
        field: field.to_string(),
    })
}

/// Parse a stored float field.
pub(crate) fn parse_float(key: &str, field: &str, raw: &str) -> Result<f64, Error> {
    raw.parse::<f64>().map_err(|_| Error::WrongFieldType {
        key: key.to_string(),
        field: field.to_string(),
    })
}

impl<T: MetricStore + ?Sized> MetricStore for std::sync::Arc<T> {
    fn increment_integer(&self, key: &str, field: &str, delta: i64) -> Result<i64, Error> {
        (**self).increment_integer(key, field, delta)
    }

    fn increment_float(&self, key: &str, field: &str, delta: f64) -> Result<f64, Error> {
        (**self).increment_float(key, field, delta)
    }

    fn set_field(&self, key: &str, field: &str, value: &str) -> Result<bool, Error> {
        (**self).set_field(key, field, value)
    }

    fn read_fields(&self, key: &str) -> Result<BTreeMap<String, String>, Error> {
        (**self).read_fields(key)
    }

    fn add_member(&self, set: &str, member: &str) -> Result<bool, Error> {
        (**self).add_member(set, member)
    }

    fn members(&self, set: &str) -> Result<Vec<String>, Error> {
        (**self).members(set)
    }

    fn remove_records_with_prefix(&self, prefix: &str) -> Result<usize, Error> {
        (**self).remove_records_with_prefix(prefix)
    }

    fn remove_set(&self, set: &str) -> Result<usize, Error> {
        (**self).remove_set(set)
    }

    fn flush(&self) -> Result<(), Error> {
        (**self).flush()
    }
}
