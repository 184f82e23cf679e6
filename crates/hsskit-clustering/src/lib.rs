//! Clustering and neighbor search for hierarchical matrices
//!
//! - [`PartitionTree`]: binary tree of index ranges that defines the HSS block
//!   structure
//! - [`recursive_bisection`]: reorders points so tree nodes are contiguous
//!   clusters
//! - [`find_approximate_neighbors`]: randomized projection-tree kNN used to
//!   pick sample columns during compression
//! - [`write_binmatrix`] / [`read_binmatrix`]: raw matrix files for caching

pub mod binmatrix;
pub mod clustering;
pub mod error;
pub mod metrics;
pub mod neighbors;
pub mod tree;

pub use binmatrix::{read_binmatrix, write_binmatrix, BinElement};
pub use clustering::{recursive_bisection, Clustering, ClusteringAlgorithm};
pub use error::{ClusteringError, Result};
pub use metrics::{dot, euclidean_distance, euclidean_distance_squared, norm1_distance};
pub use neighbors::{find_approximate_neighbors, AnnOptions, AnnReport, NeighborTable};
pub use tree::PartitionTree;
