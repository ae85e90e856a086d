//! Benchmark harness helpers.
//!
//! This module provides utilities for setting up and populating stores.

use tallystore_core::{
    HistogramUpdate, MemoryStore, MetricStore, MetricsAdapter, ScalarUpdate, SledStore,
    StorageConfig, UpdateCommand,
};

use crate::fixtures::{label_values, observations, Scale, LATENCY_BUCKETS};

/// Test context for benchmarks.
///
/// Holds one adapter per store backend over isolated temporary storage.
pub struct TestContext {
    pub memory: MetricsAdapter<MemoryStore>,
    pub sled: MetricsAdapter<SledStore>,
    _storage_dir: tempfile::TempDir,
}

impl TestContext {
    /// Create a new empty test context.
    pub fn new() -> Self {
        let storage_dir = tempfile::tempdir().unwrap();
        let sled = MetricsAdapter::open(StorageConfig::new(storage_dir.path()));
        let memory = MetricsAdapter::in_memory(tallystore_core::storage::DEFAULT_PREFIX);

        Self {
            memory,
            sled,
            _storage_dir: storage_dir,
        }
    }

    /// Create a test context with both stores populated.
    pub fn with_scale(scale: Scale) -> Self {
        let ctx = Self::new();
        populate(&ctx.memory, scale);
        populate(&ctx.sled, scale);
        ctx
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter update for one route.
pub fn counter_update(name: &str, route: &str) -> ScalarUpdate {
    ScalarUpdate::new(name, UpdateCommand::IncrementInteger, 1.0)
        .with_help("Requests served")
        .with_labels(["route"], [route])
}

/// Histogram observation for one route.
pub fn histogram_update(name: &str, route: &str, value: f64) -> HistogramUpdate {
    HistogramUpdate::new(name, LATENCY_BUCKETS.to_vec(), value)
        .with_help("Request latency in seconds")
        .with_labels(["route"], [route])
}

/// Write counters, gauges and histograms at the given scale.
pub fn populate<S: MetricStore>(adapter: &MetricsAdapter<S>, scale: Scale) {
    let routes = label_values(scale.tuples());
    let values = observations(scale.tuples() * 4);

    for metric in 0..scale.metrics() {
        let counter = format!("requests_{}", metric);
        let gauge = format!("inflight_{}", metric);
        let histogram = format!("latency_{}", metric);

        for (i, route) in routes.iter().enumerate() {
            adapter.update_counter(&counter_update(&counter, route)).unwrap();
            adapter
                .update_gauge(
                    &ScalarUpdate::new(&gauge, UpdateCommand::Set, i as f64)
                        .with_labels(["route"], [route.as_str()]),
                )
                .unwrap();
            for value in &values[i * 4..i * 4 + 4] {
                adapter
                    .update_histogram(&histogram_update(&histogram, route, *value))
                    .unwrap();
            }
        }
    }

    adapter.flush().unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tallystore_core::MetricKind;

    #[test]
    fn test_populate_small() {
        let ctx = TestContext::with_scale(Scale::Small);

        for collection in [ctx.memory.collect().unwrap(), ctx.sled.collect().unwrap()] {
            assert!(collection.is_complete());
            assert_eq!(collection.families.len(), Scale::Small.metrics() * 3);

            let latency = collection.family(MetricKind::Histogram, "latency_0").unwrap();
            // 11 bounds + Inf, count, sum per route
            assert_eq!(latency.samples.len(), Scale::Small.tuples() * 14);
        }
    }
}
