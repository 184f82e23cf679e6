//! Options controlling HSS compression

use crate::error::{HSSError, Result};
use hsskit_clustering::ClusteringAlgorithm;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Randomized compression scheme for the sampling-driven path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionAlgorithm {
    /// Fixed oversampling; the sample width roughly doubles on failure
    Original,
    /// Bases certified against `dd` extra sample columns, grown by `dd`
    #[default]
    Stable,
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionAlgorithm::Original => f.write_str("original"),
            CompressionAlgorithm::Stable => f.write_str("stable"),
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = HSSError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "original" => Ok(CompressionAlgorithm::Original),
            "stable" => Ok(CompressionAlgorithm::Stable),
            _ => Err(HSSError::UnknownCompressionAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// Options for HSS construction and compression
#[derive(Debug, Clone)]
pub struct HSSOptions {
    /// Largest leaf of the partition tree
    pub leaf_size: usize,
    /// Relative compression tolerance
    pub rel_tol: f64,
    /// Absolute compression tolerance
    pub abs_tol: f64,
    /// Cap on every basis rank
    pub max_rank: usize,
    /// Initial number of random sample columns
    pub d0: usize,
    /// Sample columns added per round (stable scheme)
    pub dd: usize,
    /// Oversampling
    pub p: usize,
    /// Compression scheme of the sampling-driven path
    pub compression_algorithm: CompressionAlgorithm,
    /// Initial neighbor count of the ANN-driven path
    pub approximate_neighbors: usize,
    /// Projection-tree rounds of the neighbor search
    pub ann_iterations: usize,
    /// Folder for cached neighbor tables; `None` disables the cache
    pub scratch_folder: Option<PathBuf>,
    /// Keep only the `rows + dd` closest candidate columns per node
    pub drop_ann_columns: bool,
    /// Seed of every random draw
    pub random_seed: u64,
    /// Recursion depth below which subtrees run sequentially
    pub task_recursion_cutoff: usize,
    /// Reordering applied to kernel data before compression
    pub clustering_algorithm: ClusteringAlgorithm,
    /// Log per-round progress at info level
    pub verbose: bool,
}

impl Default for HSSOptions {
    fn default() -> Self {
        Self {
            leaf_size: 512,
            rel_tol: 1e-2,
            abs_tol: 1e-8,
            max_rank: 5000,
            d0: 128,
            dd: 64,
            p: 10,
            compression_algorithm: CompressionAlgorithm::Stable,
            approximate_neighbors: 64,
            ann_iterations: 5,
            scratch_folder: None,
            drop_ann_columns: false,
            random_seed: 1,
            task_recursion_cutoff: 5,
            clustering_algorithm: ClusteringAlgorithm::Natural,
            verbose: false,
        }
    }
}

impl HSSOptions {
    /// Set the leaf size
    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    /// Set the relative tolerance
    pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
        self.rel_tol = rel_tol;
        self
    }

    /// Set the absolute tolerance
    pub fn with_abs_tol(mut self, abs_tol: f64) -> Self {
        self.abs_tol = abs_tol;
        self
    }

    /// Set the maximum rank
    pub fn with_max_rank(mut self, max_rank: usize) -> Self {
        self.max_rank = max_rank;
        self
    }

    /// Set the initial sample width
    pub fn with_d0(mut self, d0: usize) -> Self {
        self.d0 = d0;
        self
    }

    /// Set the sample increment
    pub fn with_dd(mut self, dd: usize) -> Self {
        self.dd = dd;
        self
    }

    /// Set the compression scheme
    pub fn with_compression_algorithm(mut self, alg: CompressionAlgorithm) -> Self {
        self.compression_algorithm = alg;
        self
    }

    /// Set the initial neighbor count
    pub fn with_approximate_neighbors(mut self, k: usize) -> Self {
        self.approximate_neighbors = k;
        self
    }

    /// Set the neighbor cache folder
    pub fn with_scratch_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.scratch_folder = Some(folder.into());
        self
    }

    /// Enable or disable candidate column dropping
    pub fn with_drop_ann_columns(mut self, drop: bool) -> Self {
        self.drop_ann_columns = drop;
        self
    }

    /// Set the random seed
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Set the clustering algorithm
    pub fn with_clustering_algorithm(mut self, alg: ClusteringAlgorithm) -> Self {
        self.clustering_algorithm = alg;
        self
    }

    /// Enable verbose progress logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
