//! Tallystore Core - Shared-store persistence and aggregation for metrics.
//!
//! Many uncoordinated producers write counter, gauge and histogram updates
//! into one key-value store using only atomic single-field operations; any
//! collector can later rebuild the complete, ordered sample set, including
//! cumulative histogram buckets, from the raw fields.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod command;
pub mod error;
pub mod exposition;
pub mod metrics;
pub mod storage;

pub use command::{FieldOp, FieldWrite, UpdateCommand};
pub use error::Error;
pub use metrics::{
    Collection, CollectFailure, HistogramUpdate, MetaRecord, MetricCollector, MetricFamily,
    MetricKind, MetricUpdater, MetricsAdapter, Sample, ScalarUpdate,
};
pub use storage::{
    BucketMarker, FieldKey, KeyEncoder, MemoryStore, MetricStore, SledStore, StorageConfig,
};
