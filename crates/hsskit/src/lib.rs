//! Structured dense matrix approximation for kernel methods
//!
//! Umbrella crate over the hsskit workspace:
//! - [`dense`]: dense matrices, LU/QR and the interpolative decomposition
//! - [`clustering`]: partition trees, point reordering, approximate neighbors
//! - [`hss`]: HSS compression, products, ULV factorization and solve
//! - [`kernel`]: kernel matrices and kernel ridge regression
//!
//! The most used types are re-exported at the top level.

pub use hsskit_clustering as clustering;
pub use hsskit_dense as dense;
pub use hsskit_hss as hss;
pub use hsskit_kernel as kernel;

pub use hsskit_clustering::{
    find_approximate_neighbors, recursive_bisection, AnnOptions, ClusteringAlgorithm, NeighborTable,
    PartitionTree,
};
pub use hsskit_dense::{Matrix, Scalar};
pub use hsskit_hss::{
    CompressionAlgorithm, CompressionReport, ElementSampler, HSSError, HSSFactors, HSSMatrix, HSSOptions,
    MultiplySampler, PointKernel, State,
};
pub use hsskit_kernel::{GaussKernel, KernelFunction, KernelMatrix, KernelType, LaplaceKernel};
