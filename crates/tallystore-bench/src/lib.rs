//! Tallystore Benchmark Suite
//!
//! Criterion benchmarks for the update and collection paths.
//!
//! # Benchmark Categories
//!
//! - **Update**: counter, gauge and histogram writes on both stores
//! - **Collect**: rebuilding sample lists from populated stores

pub mod fixtures;
pub mod harness;

pub use fixtures::{label_values, observations, Scale, LATENCY_BUCKETS};
pub use harness::TestContext;
