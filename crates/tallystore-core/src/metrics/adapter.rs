//! Store-owning façade over the updater and the collector.

use crate::error::Error;
use crate::storage::{KeyEncoder, MemoryStore, MetricStore, SledStore, StorageConfig};

use super::collector::MetricCollector;
use super::types::{Collection, MetricKind};
use super::updater::{HistogramUpdate, MetricUpdater, ScalarUpdate};

/// Owns one store and one key namespace and exposes every metric operation.
///
/// The adapter keeps no state besides the store handle, so any number of
/// adapters (in one process or many) can share the same backing store.
pub struct MetricsAdapter<S> {
    store: S,
    keys: KeyEncoder,
}

impl MetricsAdapter<SledStore> {
    /// Build an adapter over a sled database. The database opens on first use.
    pub fn open(config: StorageConfig) -> Self {
        let keys = KeyEncoder::new(config.prefix.clone());
        Self::new(SledStore::new(config), keys)
    }
}

impl MetricsAdapter<MemoryStore> {
    /// Build an adapter over a fresh in-process store.
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self::new(MemoryStore::new(), KeyEncoder::new(prefix))
    }
}

impl<S: MetricStore> MetricsAdapter<S> {
    /// Build an adapter over any store.
    pub fn new(store: S, keys: KeyEncoder) -> Self {
        Self { store, keys }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The key layout.
    pub fn keys(&self) -> &KeyEncoder {
        &self.keys
    }

    /// Get an updater borrowing this adapter's store.
    pub fn updater(&self) -> MetricUpdater<'_, S> {
        MetricUpdater::new(&self.store, &self.keys)
    }

    /// Get a collector borrowing this adapter's store.
    pub fn collector(&self) -> MetricCollector<'_, S> {
        MetricCollector::new(&self.store, &self.keys)
    }

    /// Apply a counter update.
    pub fn update_counter(&self, update: &ScalarUpdate) -> Result<(), Error> {
        self.updater().update_counter(update)
    }

    /// Apply a gauge update.
    pub fn update_gauge(&self, update: &ScalarUpdate) -> Result<(), Error> {
        self.updater().update_gauge(update)
    }

    /// Record a histogram observation.
    pub fn update_histogram(&self, update: &HistogramUpdate) -> Result<(), Error> {
        self.updater().update_histogram(update)
    }

    /// Collect every registered metric.
    pub fn collect(&self) -> Result<Collection, Error> {
        self.collector().collect()
    }

    /// Collect the registered metrics of one type.
    pub fn collect_kind(&self, kind: MetricKind) -> Result<Collection, Error> {
        self.collector().collect_kind(kind)
    }

    /// Delete every record and discovery set of this namespace.
    ///
    /// Irreversible. Returns the number of removed fields and set members.
    pub fn wipe_all(&self) -> Result<usize, Error> {
        tracing::warn!(prefix = self.keys.prefix(), "wiping metric namespace");

        let mut removed = self
            .store
            .remove_records_with_prefix(&self.keys.namespace_prefix())?;
        for kind in MetricKind::ALL {
            removed += self.store.remove_set(&self.keys.discovery_key(kind))?;
        }
        self.store.flush()?;

        Ok(removed)
    }

    /// Persist buffered writes.
    pub fn flush(&self) -> Result<(), Error> {
        self.store.flush()
    }
}
