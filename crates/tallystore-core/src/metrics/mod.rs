//! Metric update and collection.
//!
//! Updates are written as atomic single-field operations; collection reads
//! the records back and rebuilds exposition-ready families.
//!
//! # Usage
//!
//! ```
//! use tallystore_core::metrics::{HistogramUpdate, MetricKind, MetricsAdapter, ScalarUpdate};
//! use tallystore_core::UpdateCommand;
//!
//! let adapter = MetricsAdapter::in_memory("app");
//!
//! adapter
//!     .update_counter(
//!         &ScalarUpdate::new("hits", UpdateCommand::IncrementInteger, 1.0)
//!             .with_labels(["color"], ["blue"]),
//!     )
//!     .unwrap();
//! adapter
//!     .update_histogram(&HistogramUpdate::new("latency", vec![1.0, 5.0], 3.0))
//!     .unwrap();
//!
//! let collection = adapter.collect().unwrap();
//! let hits = collection.family(MetricKind::Counter, "hits").unwrap();
//! assert_eq!(hits.samples[0].value, 1.0);
//! ```

mod adapter;
mod collector;
mod types;
mod updater;

pub use adapter::MetricsAdapter;
pub use collector::{MetricCollector, BUCKET_LABEL};
pub use types::{
    CollectFailure, Collection, MetaRecord, MetricFamily, MetricKind, Sample,
};
pub use updater::{select_bucket, HistogramUpdate, MetricUpdater, ScalarUpdate};
