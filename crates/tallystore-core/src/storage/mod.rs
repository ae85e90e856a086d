//! Storage layer for metric records.
//!
//! This module defines the store abstraction, the key layout shared by every
//! backend, and two backends: a sled-based embedded store and an in-process
//! map store.

mod backend;
mod config;
mod memory;
mod sled_store;

pub mod key;

pub use backend::MetricStore;
pub use config::{StorageConfig, DEFAULT_PREFIX};
pub use key::{BucketMarker, FieldKey, KeyEncoder, META_FIELD};
pub use memory::MemoryStore;
pub use sled_store::SledStore;

pub(crate) use backend::format_number;
