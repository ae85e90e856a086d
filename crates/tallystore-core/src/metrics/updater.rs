//! Write path: applying counter, gauge and histogram updates to the store.

use crate::command::UpdateCommand;
use crate::error::Error;
use crate::storage::{BucketMarker, FieldKey, KeyEncoder, MetricStore, META_FIELD};

use super::types::{MetaRecord, MetricKind};

/// A counter or gauge update.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarUpdate {
    /// Metric name.
    pub name: String,
    /// Help text, persisted on first write.
    pub help: String,
    /// Declared label names.
    pub label_names: Vec<String>,
    /// Label values, one per declared name.
    pub label_values: Vec<String>,
    /// Delta for increments, absolute value for sets.
    pub value: f64,
    /// How the value is applied.
    pub command: UpdateCommand,
}

impl ScalarUpdate {
    /// Create an unlabelled update.
    pub fn new(name: impl Into<String>, command: UpdateCommand, value: f64) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            label_names: Vec::new(),
            label_values: Vec::new(),
            value,
            command,
        }
    }

    /// Set the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Set label names and values.
    pub fn with_labels<N, V>(mut self, names: N, values: V) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        self.label_names = names.into_iter().map(Into::into).collect();
        self.label_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// A histogram observation.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramUpdate {
    /// Metric name.
    pub name: String,
    /// Help text, persisted on first write.
    pub help: String,
    /// Declared label names.
    pub label_names: Vec<String>,
    /// Label values, one per declared name.
    pub label_values: Vec<String>,
    /// Observed value.
    pub value: f64,
    /// Bucket boundaries, already sorted ascending by the caller.
    pub buckets: Vec<f64>,
}

impl HistogramUpdate {
    /// Create an unlabelled observation.
    pub fn new(name: impl Into<String>, buckets: impl Into<Vec<f64>>, value: f64) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            label_names: Vec::new(),
            label_values: Vec::new(),
            value,
            buckets: buckets.into(),
        }
    }

    /// Set the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Set label names and values.
    pub fn with_labels<N, V>(mut self, names: N, values: V) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        self.label_names = names.into_iter().map(Into::into).collect();
        self.label_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// Applies updates to a store.
///
/// Holds no state of its own: every call is one or two atomic field writes,
/// plus the metadata and discovery writes when the call looks like the first
/// write of its label tuple.
pub struct MetricUpdater<'a, S: ?Sized> {
    store: &'a S,
    keys: &'a KeyEncoder,
}

impl<'a, S: MetricStore + ?Sized> MetricUpdater<'a, S> {
    /// Create an updater over a store and key layout.
    pub fn new(store: &'a S, keys: &'a KeyEncoder) -> Self {
        Self { store, keys }
    }

    /// Apply a counter update.
    pub fn update_counter(&self, update: &ScalarUpdate) -> Result<(), Error> {
        self.update_scalar(MetricKind::Counter, update)
    }

    /// Apply a gauge update.
    pub fn update_gauge(&self, update: &ScalarUpdate) -> Result<(), Error> {
        self.update_scalar(MetricKind::Gauge, update)
    }

    /// Record a histogram observation.
    pub fn update_histogram(&self, update: &HistogramUpdate) -> Result<(), Error> {
        check_labels(&update.name, &update.label_names, &update.label_values)?;
        if update.value.is_nan() {
            return Err(Error::InvalidValue(format!(
                "histogram '{}' cannot observe NaN",
                update.name
            )));
        }
        if let Some(bound) = update.buckets.iter().find(|bound| !bound.is_finite()) {
            return Err(Error::InvalidValue(format!(
                "histogram '{}' has non-finite bucket bound {}",
                update.name, bound
            )));
        }

        let key = self.keys.storage_key(MetricKind::Histogram, &update.name)?;
        let marker = select_bucket(&update.buckets, update.value);
        let sum_field = FieldKey::sum(update.label_values.clone()).encode()?;
        let bucket_field = FieldKey::bucket(marker, update.label_values.clone()).encode()?;

        let sum = self.store.increment_float(&key, &sum_field, update.value)?;
        self.store.increment_integer(&key, &bucket_field, 1)?;

        if sum == update.value {
            let meta = MetaRecord::histogram(
                &update.name,
                &update.help,
                &update.label_names,
                &update.buckets,
            );
            self.register(MetricKind::Histogram, &key, &meta)?;
        }

        Ok(())
    }

    fn update_scalar(&self, kind: MetricKind, update: &ScalarUpdate) -> Result<(), Error> {
        check_labels(&update.name, &update.label_names, &update.label_values)?;

        let op = update.command.dispatch(update.value)?;
        let key = self.keys.storage_key(kind, &update.name)?;
        let field = FieldKey::new(update.label_values.clone()).encode()?;

        let outcome = op.apply(self.store, &key, &field)?;
        if op.is_first_write(outcome) {
            let meta = MetaRecord::scalar(kind, &update.name, &update.help, &update.label_names);
            self.register(kind, &key, &meta)?;
        }

        Ok(())
    }

    /// Persist metadata and make the metric discoverable.
    fn register(&self, kind: MetricKind, key: &str, meta: &MetaRecord) -> Result<(), Error> {
        self.store.set_field(key, META_FIELD, &meta.to_json()?)?;
        let added = self.store.add_member(&self.keys.discovery_key(kind), key)?;
        tracing::debug!(key, kind = %kind, newly_discovered = added, "registered metric");
        Ok(())
    }
}

/// Pick the bucket an observation falls into.
///
/// The first boundary `b` with `value <= b` wins; values above every boundary
/// go to `+Inf`. Boundaries are scanned in the given order and never sorted.
pub fn select_bucket(bounds: &[f64], value: f64) -> BucketMarker {
    bounds
        .iter()
        .find(|&&bound| value <= bound)
        .map_or(BucketMarker::Inf, |&bound| BucketMarker::Bound(bound))
}

fn check_labels(metric: &str, names: &[String], values: &[String]) -> Result<(), Error> {
    if names.len() != values.len() {
        return Err(Error::LabelMismatch {
            metric: metric.to_string(),
            expected: names.len(),
            actual: values.len(),
        });
    }
    Ok(())
}
