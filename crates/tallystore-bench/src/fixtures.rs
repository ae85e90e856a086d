//! Test data generation for benchmarks.
//!
//! Generators are seeded so every run sees the same data.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Bucket bounds used by every benchmark histogram.
pub const LATENCY_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Scale factor for benchmark data generation.
#[derive(Clone, Copy, Debug)]
pub enum Scale {
    /// Small scale: 10 label tuples per metric
    Small,
    /// Medium scale: 100 label tuples per metric
    Medium,
    /// Large scale: 1,000 label tuples per metric
    Large,
}

impl Scale {
    /// Number of distinct label tuples per metric.
    pub fn tuples(&self) -> usize {
        match self {
            Scale::Small => 10,
            Scale::Medium => 100,
            Scale::Large => 1_000,
        }
    }

    /// Number of metrics of each type.
    pub fn metrics(&self) -> usize {
        match self {
            Scale::Small => 2,
            Scale::Medium => 5,
            Scale::Large => 10,
        }
    }
}

/// Distinct `route` label values.
pub fn label_values(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("/route/{:04}", i)).collect()
}

/// Latency-like observations, mostly below one second with a long tail.
pub fn observations(count: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            let base: f64 = rng.gen_range(0.0..1.0);
            if rng.gen_bool(0.05) {
                base * 20.0
            } else {
                base * base
            }
        })
        .collect()
}
