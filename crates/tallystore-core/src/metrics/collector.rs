//! Read path: rebuilding exposition-ready families from stored fields.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::error::Error;
use crate::storage::{BucketMarker, FieldKey, KeyEncoder, MetricStore, META_FIELD};

use super::types::{CollectFailure, Collection, MetaRecord, MetricFamily, MetricKind, Sample};

/// Label name carrying the bucket boundary of `_bucket` samples.
pub const BUCKET_LABEL: &str = "le";

/// Reconstructs metric families from a store.
///
/// Collection reads each metric's record independently. There is no snapshot
/// across records, so a metric whose first write is still in flight can be
/// missing from one pass and present in the next.
pub struct MetricCollector<'a, S: ?Sized> {
    store: &'a S,
    keys: &'a KeyEncoder,
}

impl<'a, S: MetricStore + ?Sized> MetricCollector<'a, S> {
    /// Create a collector over a store and key layout.
    pub fn new(store: &'a S, keys: &'a KeyEncoder) -> Self {
        Self { store, keys }
    }

    /// Collect every registered metric of every type.
    ///
    /// A store failure aborts the pass. A metric whose record cannot be
    /// decoded is reported in [`Collection::failures`] and the pass goes on.
    pub fn collect(&self) -> Result<Collection, Error> {
        let mut collection = Collection::default();
        for kind in MetricKind::ALL {
            self.collect_into(kind, &mut collection)?;
        }
        Ok(collection)
    }

    /// Collect every registered metric of one type.
    pub fn collect_kind(&self, kind: MetricKind) -> Result<Collection, Error> {
        let mut collection = Collection::default();
        self.collect_into(kind, &mut collection)?;
        Ok(collection)
    }

    fn collect_into(&self, kind: MetricKind, collection: &mut Collection) -> Result<(), Error> {
        let mut keys = self.store.members(&self.keys.discovery_key(kind))?;
        keys.sort();

        for key in keys {
            match self.collect_metric(kind, &key) {
                Ok(family) => collection.families.push(family),
                Err(error) if error.is_storage() => return Err(error),
                Err(error) => {
                    tracing::warn!(key = %key, kind = %kind, error = %error, "failed to collect metric");
                    collection.failures.push(CollectFailure { kind, key, error });
                }
            }
        }

        Ok(())
    }

    fn collect_metric(&self, kind: MetricKind, key: &str) -> Result<MetricFamily, Error> {
        let mut fields = self.store.read_fields(key)?;

        let raw_meta = fields.remove(META_FIELD).ok_or_else(|| Error::CorruptMetadata {
            key: key.to_string(),
            reason: "metadata field is missing".to_string(),
        })?;
        let meta = MetaRecord::from_json(&raw_meta).map_err(|e| Error::CorruptMetadata {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        if meta.kind != kind {
            return Err(Error::CorruptMetadata {
                key: key.to_string(),
                reason: format!("registered as {} but metadata says {}", kind, meta.kind),
            });
        }

        let samples = match kind {
            MetricKind::Counter | MetricKind::Gauge => scalar_samples(key, &meta, fields)?,
            MetricKind::Histogram => histogram_samples(key, &meta, fields)?,
        };

        Ok(MetricFamily::from_meta(meta, samples))
    }
}

/// One sample per label tuple, ordered by concatenated label values.
fn scalar_samples(
    key: &str,
    meta: &MetaRecord,
    fields: BTreeMap<String, String>,
) -> Result<Vec<Sample>, Error> {
    let mut samples = Vec::with_capacity(fields.len());

    for (field, raw) in fields {
        let decoded = decode_field(key, &field)?;
        if decoded.bucket.is_some() {
            return Err(corrupt_field(key, &field, "bucket marker on a scalar metric"));
        }
        let value = parse_value(key, &field, &raw)?;
        samples.push(Sample::new(meta.name.clone(), Vec::new(), decoded.labels, value));
    }

    samples.sort_by(|a, b| compare_label_values(&a.label_values, &b.label_values));
    Ok(samples)
}

#[derive(Default)]
struct TupleData {
    labels: Vec<String>,
    buckets: HashMap<String, f64>,
    sum: Option<f64>,
}

/// `_bucket` samples with cumulative fill-forward, then `_count` and `_sum`,
/// for every label tuple that has at least one bucket field.
fn histogram_samples(
    key: &str,
    meta: &MetaRecord,
    fields: BTreeMap<String, String>,
) -> Result<Vec<Sample>, Error> {
    let mut tuples: HashMap<String, TupleData> = HashMap::new();

    for (field, raw) in fields {
        let decoded = decode_field(key, &field)?;
        let value = parse_value(key, &field, &raw)?;
        let tuple_key = decoded.tuple_key()?;

        let marker = decoded
            .bucket
            .ok_or_else(|| corrupt_field(key, &field, "histogram field without bucket marker"))?;
        let tuple = tuples.entry(tuple_key).or_default();
        if marker.is_sum() {
            tuple.sum = Some(value);
        } else {
            tuple.buckets.insert(marker.to_string(), value);
        }
        if tuple.labels.is_empty() {
            tuple.labels = decoded.labels;
        }
    }

    // A tuple whose sum is visible but none of its buckets yet has nothing
    // to expose.
    let mut ordered: Vec<TupleData> = tuples
        .into_values()
        .filter(|tuple| !tuple.buckets.is_empty())
        .collect();
    ordered.sort_by(|a, b| a.labels.cmp(&b.labels));

    let mut bounds: Vec<BucketMarker> = meta
        .buckets
        .iter()
        .flatten()
        .map(|&bound| BucketMarker::Bound(bound))
        .collect();
    bounds.push(BucketMarker::Inf);

    let bucket_name = format!("{}_bucket", meta.name);
    let count_name = format!("{}_count", meta.name);
    let sum_name = format!("{}_sum", meta.name);

    let mut samples = Vec::with_capacity(ordered.len() * (bounds.len() + 2));
    for tuple in ordered {
        let mut cumulative = 0.0;
        for bound in &bounds {
            let le = bound.to_string();
            if let Some(count) = tuple.buckets.get(&le) {
                cumulative += count;
            }
            let mut label_values = tuple.labels.clone();
            label_values.push(le);
            samples.push(Sample::new(
                bucket_name.clone(),
                vec![BUCKET_LABEL.to_string()],
                label_values,
                cumulative,
            ));
        }

        samples.push(Sample::new(
            count_name.clone(),
            Vec::new(),
            tuple.labels.clone(),
            cumulative,
        ));
        samples.push(Sample::new(
            sum_name.clone(),
            Vec::new(),
            tuple.labels,
            tuple.sum.unwrap_or(0.0),
        ));
    }

    Ok(samples)
}

/// Order counter and gauge samples by their concatenated label values,
/// falling back to the label values themselves when concatenations tie.
fn compare_label_values(a: &[String], b: &[String]) -> Ordering {
    a.concat().cmp(&b.concat()).then_with(|| a.cmp(b))
}

fn decode_field(key: &str, field: &str) -> Result<FieldKey, Error> {
    FieldKey::decode(field).map_err(|e| corrupt_field(key, field, &e.to_string()))
}

fn parse_value(key: &str, field: &str, raw: &str) -> Result<f64, Error> {
    raw.parse::<f64>()
        .map_err(|_| corrupt_field(key, field, &format!("value '{}' is not a number", raw)))
}

fn corrupt_field(key: &str, field: &str, reason: &str) -> Error {
    Error::CorruptField {
        key: key.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const HIST_KEY: &str = "t:histogram:latency";

    fn register(store: &MemoryStore, kind: MetricKind, key: &str, meta: &MetaRecord) {
        store.set_field(key, META_FIELD, &meta.to_json().unwrap()).unwrap();
        store
            .add_member(&KeyEncoder::new("t").discovery_key(kind), key)
            .unwrap();
    }

    fn values(samples: &[Sample]) -> Vec<f64> {
        samples.iter().map(|s| s.value).collect()
    }

    #[test]
    fn test_scalar_samples_sorted_by_concatenated_labels() {
        let store = MemoryStore::new();
        let keys = KeyEncoder::new("t");
        let meta = MetaRecord::scalar(
            MetricKind::Counter,
            "hits",
            "",
            &["a".to_string(), "b".to_string()],
        );
        register(&store, MetricKind::Counter, "t:counter:hits", &meta);
        store.set_field("t:counter:hits", r#"{"l":["red","x"]}"#, "5").unwrap();
        store.set_field("t:counter:hits", r#"{"l":["blue","z"]}"#, "3").unwrap();
        store.set_field("t:counter:hits", r#"{"l":["b","luez"]}"#, "1").unwrap();

        let collection = MetricCollector::new(&store, &keys).collect().unwrap();
        let family = collection.family(MetricKind::Counter, "hits").unwrap();

        let labels: Vec<Vec<String>> = family
            .samples
            .iter()
            .map(|s| s.label_values.clone())
            .collect();
        assert_eq!(
            labels,
            vec![
                vec!["b".to_string(), "luez".to_string()],
                vec!["blue".to_string(), "z".to_string()],
                vec!["red".to_string(), "x".to_string()],
            ]
        );
        assert!(family.samples.iter().all(|s| s.label_names.is_empty()));
        assert_eq!(values(&family.samples), vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_histogram_fill_forward_from_sparse_buckets() {
        let store = MemoryStore::new();
        let keys = KeyEncoder::new("t");
        let meta = MetaRecord::histogram("latency", "", &[], &[1.0, 2.0, 5.0, 10.0]);
        register(&store, MetricKind::Histogram, HIST_KEY, &meta);
        // Only the 2 and +Inf buckets ever received observations.
        store.set_field(HIST_KEY, r#"{"b":"2","l":[]}"#, "4").unwrap();
        store.set_field(HIST_KEY, r#"{"b":"+Inf","l":[]}"#, "1").unwrap();
        store.set_field(HIST_KEY, r#"{"b":"sum","l":[]}"#, "20.5").unwrap();

        let collection = MetricCollector::new(&store, &keys).collect().unwrap();
        let family = collection.family(MetricKind::Histogram, "latency").unwrap();

        let names: Vec<&str> = family.samples.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "latency_bucket",
                "latency_bucket",
                "latency_bucket",
                "latency_bucket",
                "latency_bucket",
                "latency_count",
                "latency_sum"
            ]
        );
        assert_eq!(values(&family.samples), vec![0.0, 4.0, 4.0, 4.0, 5.0, 5.0, 20.5]);

        let les: Vec<&str> = family.samples[..5]
            .iter()
            .map(|s| s.label_values[0].as_str())
            .collect();
        assert_eq!(les, vec!["1", "2", "5", "10", "+Inf"]);
        assert_eq!(family.samples[0].label_names, vec![BUCKET_LABEL]);
    }

    #[test]
    fn test_histogram_tuples_are_ordered_and_deduplicated() {
        let store = MemoryStore::new();
        let keys = KeyEncoder::new("t");
        let meta = MetaRecord::histogram("latency", "", &["route".to_string()], &[1.0]);
        register(&store, MetricKind::Histogram, HIST_KEY, &meta);
        for route in ["/z", "/a"] {
            store
                .set_field(HIST_KEY, &format!(r#"{{"b":"1","l":["{}"]}}"#, route), "1")
                .unwrap();
            store
                .set_field(HIST_KEY, &format!(r#"{{"b":"+Inf","l":["{}"]}}"#, route), "2")
                .unwrap();
            store
                .set_field(HIST_KEY, &format!(r#"{{"b":"sum","l":["{}"]}}"#, route), "7")
                .unwrap();
        }

        let collection = MetricCollector::new(&store, &keys).collect().unwrap();
        let family = collection.family(MetricKind::Histogram, "latency").unwrap();

        // Two tuples, each with 2 buckets + count + sum.
        assert_eq!(family.samples.len(), 8);
        assert_eq!(family.samples[0].label_values, vec!["/a", "1"]);
        assert_eq!(family.samples[4].label_values, vec!["/z", "1"]);
        assert_eq!(family.samples[2].name, "latency_count");
        assert_eq!(family.samples[2].value, 3.0);
        assert_eq!(family.samples[3].label_values, vec!["/a"]);
    }

    #[test]
    fn test_histogram_tuples_compare_element_wise() {
        let store = MemoryStore::new();
        let keys = KeyEncoder::new("t");
        let meta = MetaRecord::histogram(
            "latency",
            "",
            &["x".to_string(), "y".to_string()],
            &[1.0],
        );
        register(&store, MetricKind::Histogram, HIST_KEY, &meta);
        // Concatenated, "aza" sorts before "azb"; element-wise "a" < "az".
        for (x, y) in [("az", "a"), ("a", "zb")] {
            store
                .set_field(HIST_KEY, &format!(r#"{{"b":"1","l":["{}","{}"]}}"#, x, y), "1")
                .unwrap();
        }

        let collection = MetricCollector::new(&store, &keys).collect().unwrap();
        let family = collection.family(MetricKind::Histogram, "latency").unwrap();

        assert_eq!(family.samples.len(), 8);
        assert_eq!(family.samples[0].label_values, vec!["a", "zb", "1"]);
        assert_eq!(family.samples[4].label_values, vec!["az", "a", "1"]);
    }

    #[test]
    fn test_histogram_sum_without_buckets_is_skipped() {
        let store = MemoryStore::new();
        let keys = KeyEncoder::new("t");
        let meta = MetaRecord::histogram("latency", "", &[], &[1.0]);
        register(&store, MetricKind::Histogram, HIST_KEY, &meta);
        store.set_field(HIST_KEY, r#"{"b":"sum","l":[]}"#, "0.5").unwrap();

        let collection = MetricCollector::new(&store, &keys).collect().unwrap();
        let family = collection.family(MetricKind::Histogram, "latency").unwrap();
        assert!(family.samples.is_empty());
    }

    #[test]
    fn test_missing_metadata_is_reported() {
        let store = MemoryStore::new();
        let keys = KeyEncoder::new("t");
        store.set_field("t:counter:ghost", r#"{"l":[]}"#, "1").unwrap();
        store.add_member("tcounter_METRIC_KEYS", "t:counter:ghost").unwrap();

        let collection = MetricCollector::new(&store, &keys).collect().unwrap();
        assert!(collection.families.is_empty());
        assert_eq!(collection.failures.len(), 1);
        assert_eq!(collection.failures[0].key, "t:counter:ghost");
        assert!(matches!(
            collection.failures[0].error,
            Error::CorruptMetadata { .. }
        ));
    }

    #[test]
    fn test_corrupt_metric_does_not_stop_others() {
        let store = MemoryStore::new();
        let keys = KeyEncoder::new("t");
        store.set_field("t:gauge:bad", META_FIELD, "{not json").unwrap();
        store.add_member("tgauge_METRIC_KEYS", "t:gauge:bad").unwrap();

        let meta = MetaRecord::scalar(MetricKind::Gauge, "good", "", &[]);
        register(&store, MetricKind::Gauge, "t:gauge:good", &meta);
        store.set_field("t:gauge:good", r#"{"l":[]}"#, "42").unwrap();

        let collection = MetricCollector::new(&store, &keys)
            .collect_kind(MetricKind::Gauge)
            .unwrap();
        assert!(!collection.is_complete());
        assert_eq!(collection.failures[0].key, "t:gauge:bad");
        assert_eq!(
            collection.family(MetricKind::Gauge, "good").unwrap().samples[0].value,
            42.0
        );
    }

    #[test]
    fn test_kind_mismatch_is_corrupt_metadata() {
        let store = MemoryStore::new();
        let keys = KeyEncoder::new("t");
        let meta = MetaRecord::scalar(MetricKind::Gauge, "hits", "", &[]);
        register(&store, MetricKind::Counter, "t:counter:hits", &meta);

        let collection = MetricCollector::new(&store, &keys).collect().unwrap();
        assert!(matches!(
            collection.failures[0].error,
            Error::CorruptMetadata { .. }
        ));
    }

    #[test]
    fn test_corrupt_field_is_reported() {
        let store = MemoryStore::new();
        let keys = KeyEncoder::new("t");
        let meta = MetaRecord::scalar(MetricKind::Counter, "hits", "", &[]);
        register(&store, MetricKind::Counter, "t:counter:hits", &meta);
        store.set_field("t:counter:hits", "blue", "1").unwrap();

        let collection = MetricCollector::new(&store, &keys).collect().unwrap();
        assert!(matches!(
            collection.failures[0].error,
            Error::CorruptField { .. }
        ));
    }

    #[test]
    fn test_families_ordered_by_kind_then_key() {
        let store = MemoryStore::new();
        let keys = KeyEncoder::new("t");
        for (kind, name) in [
            (MetricKind::Gauge, "b"),
            (MetricKind::Counter, "z"),
            (MetricKind::Counter, "a"),
        ] {
            let meta = MetaRecord::scalar(kind, name, "", &[]);
            register(&store, kind, &keys.storage_key(kind, name).unwrap(), &meta);
        }

        let collection = MetricCollector::new(&store, &keys).collect().unwrap();
        let order: Vec<(MetricKind, &str)> = collection
            .families
            .iter()
            .map(|f| (f.kind, f.name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (MetricKind::Counter, "a"),
                (MetricKind::Counter, "z"),
                (MetricKind::Gauge, "b"),
            ]
        );
    }
}
