//! Metric metadata and collected sample types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic counter.
    Counter,
    /// Gauge.
    Gauge,
    /// Cumulative histogram.
    Histogram,
}

impl MetricKind {
    /// All kinds, in collection order.
    pub const ALL: [MetricKind; 3] = [MetricKind::Counter, MetricKind::Gauge, MetricKind::Histogram];

    /// Name used in storage keys and exposition `TYPE` lines.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown metric type '{}'", s))
    }
}

/// Metadata persisted alongside the values of a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRecord {
    /// Metric name.
    pub name: String,

    /// Help text.
    #[serde(default)]
    pub help: String,

    /// Declared label names.
    #[serde(rename = "labelNames", default)]
    pub label_names: Vec<String>,

    /// Metric type.
    #[serde(rename = "type")]
    pub kind: MetricKind,

    /// Ascending bucket boundaries, histograms only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<f64>>,
}

impl MetaRecord {
    /// Metadata of a counter or gauge.
    pub fn scalar(kind: MetricKind, name: &str, help: &str, label_names: &[String]) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names: label_names.to_vec(),
            kind,
            buckets: None,
        }
    }

    /// Metadata of a histogram.
    pub fn histogram(name: &str, help: &str, label_names: &[String], buckets: &[f64]) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names: label_names.to_vec(),
            kind: MetricKind::Histogram,
            buckets: Some(buckets.to_vec()),
        }
    }

    /// Serialize to the JSON stored in the reserved field.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse the JSON stored in the reserved field.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// One exposition sample.
///
/// The complete label set of a sample is the family's label names followed
/// by `label_names`, paired positionally with `label_values`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Sample name (`<metric>_bucket`, `<metric>_sum`, ... for histograms).
    pub name: String,
    /// Label names added by this sample on top of the family's.
    pub label_names: Vec<String>,
    /// Label values.
    pub label_values: Vec<String>,
    /// Value.
    pub value: f64,
}

impl Sample {
    /// Create a sample.
    pub fn new(
        name: impl Into<String>,
        label_names: Vec<String>,
        label_values: Vec<String>,
        value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            label_names,
            label_values,
            value,
        }
    }
}

/// A collected metric with all its samples, ready for exposition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricFamily {
    /// Metric type.
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// Metric name.
    pub name: String,
    /// Help text.
    pub help: String,
    /// Declared label names.
    pub label_names: Vec<String>,
    /// Bucket boundaries, histograms only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buckets: Option<Vec<f64>>,
    /// Samples in exposition order.
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    /// Start a family from its metadata.
    pub fn from_meta(meta: MetaRecord, samples: Vec<Sample>) -> Self {
        Self {
            kind: meta.kind,
            name: meta.name,
            help: meta.help,
            label_names: meta.label_names,
            buckets: meta.buckets,
            samples,
        }
    }
}

/// A metric that could not be collected.
#[derive(Debug)]
pub struct CollectFailure {
    /// Type of the metric.
    pub kind: MetricKind,
    /// Storage key of the metric.
    pub key: String,
    /// Why it failed.
    pub error: Error,
}

/// Result of a collection pass.
#[derive(Debug, Default)]
pub struct Collection {
    /// Successfully reconstructed families, counters first, then gauges,
    /// then histograms, each group ordered by storage key.
    pub families: Vec<MetricFamily>,
    /// Metrics that were discovered but could not be reconstructed.
    pub failures: Vec<CollectFailure>,
}

impl Collection {
    /// Whether every discovered metric was collected.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Find a collected family by type and name.
    pub fn family(&self, kind: MetricKind, name: &str) -> Option<&MetricFamily> {
        self.families
            .iter()
            .find(|family| family.kind == kind && family.name == name)
    }
}
