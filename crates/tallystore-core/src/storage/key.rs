//! Storage key and field key encoding.
//!
//! Every metric lives in one hash-like record addressed by its storage key:
//!
//! - storage key: `<prefix>:<type>:<name>`
//! - discovery set: `<prefix><type>_METRIC_KEYS`
//!
//! Inside the record each label tuple (and, for histograms, each bucket of a
//! tuple) owns one field. Field keys are compact JSON objects with a fixed
//! member order, bucket marker first and label values second:
//!
//! ```text
//! {"l":["GET","200"]}          counter / gauge
//! {"b":"0.5","l":["GET"]}      histogram bucket
//! {"b":"+Inf","l":["GET"]}     histogram overflow bucket
//! {"b":"sum","l":["GET"]}      histogram running sum
//! ```
//!
//! Member order comes from struct declaration order, never from map
//! iteration, so equal tuples always encode to identical bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::metrics::MetricKind;

/// Reserved field holding the serialized metadata record.
pub const META_FIELD: &str = "__meta__";

/// Suffix of the per-type discovery set key.
pub const DISCOVERY_SUFFIX: &str = "_METRIC_KEYS";

const INF_MARKER: &str = "+Inf";
const SUM_MARKER: &str = "sum";

/// Bucket component of a histogram field key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum BucketMarker {
    /// A declared upper boundary.
    Bound(f64),
    /// The implicit overflow bucket.
    Inf,
    /// The running sum of a label tuple.
    Sum,
}

impl BucketMarker {
    /// Whether this marker addresses the running sum rather than a bucket.
    pub fn is_sum(&self) -> bool {
        matches!(self, BucketMarker::Sum)
    }
}

impl fmt::Display for BucketMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketMarker::Bound(bound) => f.write_str(&format_bound(*bound)),
            BucketMarker::Inf => f.write_str(INF_MARKER),
            BucketMarker::Sum => f.write_str(SUM_MARKER),
        }
    }
}

impl FromStr for BucketMarker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            INF_MARKER => Ok(BucketMarker::Inf),
            SUM_MARKER => Ok(BucketMarker::Sum),
            other => other
                .parse::<f64>()
                .map(BucketMarker::Bound)
                .map_err(|_| format!("invalid bucket marker '{}'", other)),
        }
    }
}

impl From<BucketMarker> for String {
    fn from(marker: BucketMarker) -> Self {
        marker.to_string()
    }
}

impl TryFrom<String> for BucketMarker {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Render a bucket boundary in its canonical text form.
///
/// Uses the shortest decimal that round-trips (`5`, `0.25`), folds `-0` into
/// `0` and spells infinities the way the exposition format does.
pub fn format_bound(bound: f64) -> String {
    if bound == f64::INFINITY {
        INF_MARKER.to_string()
    } else if bound == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if bound == 0.0 {
        "0".to_string()
    } else {
        bound.to_string()
    }
}

/// Decoded form of a field key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldKey {
    /// Bucket marker; only histogram fields carry one.
    #[serde(rename = "b", default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<BucketMarker>,

    /// Label values in declared order.
    #[serde(rename = "l")]
    pub labels: Vec<String>,
}

impl FieldKey {
    /// Field key of a counter or gauge label tuple.
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            bucket: None,
            labels,
        }
    }

    /// Field key of one histogram bucket.
    pub fn bucket(marker: BucketMarker, labels: Vec<String>) -> Self {
        Self {
            bucket: Some(marker),
            labels,
        }
    }

    /// Field key of a histogram tuple's running sum.
    pub fn sum(labels: Vec<String>) -> Self {
        Self::bucket(BucketMarker::Sum, labels)
    }

    /// Encode into the canonical field string.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a canonical field string.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Canonical encoding of the label tuple alone, ignoring the bucket.
    ///
    /// Two fields belong to the same tuple iff their tuple keys are equal.
    pub fn tuple_key(&self) -> Result<String, Error> {
        serde_json::to_string(&self.labels).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Maps metric identities onto store keys within one namespace.
#[derive(Debug, Clone)]
pub struct KeyEncoder {
    prefix: String,
}

impl KeyEncoder {
    /// Create an encoder for the given namespace prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The namespace prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the record holding all fields of one metric.
    ///
    /// Names may not contain NUL, which stores use to separate a record key
    /// from its field names.
    pub fn storage_key(&self, kind: MetricKind, name: &str) -> Result<String, Error> {
        if name.contains('\0') {
            return Err(Error::InvalidValue(format!(
                "metric name {:?} contains a NUL byte",
                name
            )));
        }
        Ok(format!("{}:{}:{}", self.prefix, kind, name))
    }

    /// Key of the set listing every registered metric of a type.
    pub fn discovery_key(&self, kind: MetricKind) -> String {
        format!("{}{}{}", self.prefix, kind, DISCOVERY_SUFFIX)
    }

    /// Prefix shared by every storage key of this namespace.
    pub fn namespace_prefix(&self) -> String {
        format!("{}:", self.prefix)
    }
}
