//! Compression statistics
//!
//! One [`CompressionMetrics`] accumulator is created per compression call and
//! shared by reference with every task of the recursion.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe counters filled during compression
#[derive(Debug, Default)]
pub struct CompressionMetrics {
    dense_bytes: AtomicUsize,
    basis_bytes: AtomicUsize,
    coupling_bytes: AtomicUsize,
    element_evaluations: AtomicUsize,
    sample_columns: AtomicUsize,
}

impl CompressionMetrics {
    /// Fresh accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagonal block of `bytes`
    pub fn add_dense(&self, bytes: usize) {
        self.dense_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a row or column basis of `bytes`
    pub fn add_basis(&self, bytes: usize) {
        self.basis_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a coupling block of `bytes`
    pub fn add_coupling(&self, bytes: usize) {
        self.coupling_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record `count` entry evaluations
    pub fn add_elements(&self, count: usize) {
        self.element_evaluations.fetch_add(count, Ordering::Relaxed);
    }

    /// Record `count` random sample columns
    pub fn add_sample_columns(&self, count: usize) {
        self.sample_columns.fetch_add(count, Ordering::Relaxed);
    }

    /// Current values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dense_bytes: self.dense_bytes.load(Ordering::Relaxed),
            basis_bytes: self.basis_bytes.load(Ordering::Relaxed),
            coupling_bytes: self.coupling_bytes.load(Ordering::Relaxed),
            element_evaluations: self.element_evaluations.load(Ordering::Relaxed),
            sample_columns: self.sample_columns.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of the counters of a [`CompressionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Bytes allocated for diagonal blocks
    pub dense_bytes: usize,
    /// Bytes allocated for bases (recomputed bases count again)
    pub basis_bytes: usize,
    /// Bytes allocated for coupling blocks (recomputed blocks count again)
    pub coupling_bytes: usize,
    /// Matrix entries evaluated through the element sampler
    pub element_evaluations: usize,
    /// Random sample columns drawn
    pub sample_columns: usize,
}

impl MetricsSnapshot {
    /// Total bytes allocated
    pub fn total_bytes(&self) -> usize {
        self.dense_bytes + self.basis_bytes + self.coupling_bytes
    }
}

/// Outcome of a compression call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionReport {
    /// Whether the whole tree reached the compressed state
    pub compressed: bool,
    /// Compression rounds performed
    pub rounds: usize,
    /// Final sample width (sampling path) or neighbor count (ANN path)
    pub samples: usize,
    /// Largest basis rank
    pub rank: usize,
    /// Counters accumulated over all rounds
    pub metrics: MetricsSnapshot,
}
