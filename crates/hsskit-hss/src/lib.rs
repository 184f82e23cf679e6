//! Hierarchically semi-separable (HSS) matrices
//!
//! An [`HSSMatrix`] approximates a dense matrix whose off-diagonal blocks are
//! numerically low rank, with nested interpolative bases ([`HSSBasisID`]) so
//! that storage and products scale linearly in the matrix size.
//!
//! - Compression from random products and entries ([`HSSMatrix::compress_with`]),
//!   from a dense matrix ([`HSSMatrix::compress`]), or from a point kernel
//!   guided by approximate nearest neighbors ([`HSSMatrix::compress_kernel`])
//! - Products ([`HSSMatrix::apply`], [`HSSMatrix::apply_c`]) and entry
//!   extraction ([`HSSMatrix::extract`])
//! - ULV factorization and solve ([`HSSMatrix::factor`], [`HSSMatrix::solve`])
//! - Schur complement updates for 2x2 block systems
//!   ([`HSSMatrix::partial_factor`], [`HSSMatrix::schur_update`])
//!
//! # Example
//!
//! ```
//! use hsskit_dense::Matrix;
//! use hsskit_hss::{HSSMatrix, HSSOptions};
//!
//! let n = 64;
//! let a = Matrix::from_fn(n, n, |i, j| {
//!     let d = (i as f64 - j as f64) / n as f64;
//!     (-d * d).exp() + if i == j { 1.0 } else { 0.0 }
//! });
//! let opts = HSSOptions::default().with_leaf_size(16).with_rel_tol(1e-8);
//! let h = HSSMatrix::from_dense(&a, opts).unwrap();
//! assert!(h.is_compressed());
//!
//! let f = h.factor().unwrap();
//! let mut b = Matrix::from_elem(n, 1, 1.0);
//! h.solve(&f, &mut b).unwrap();
//! ```

pub mod apply;
pub mod basis;
pub mod compress;
pub mod compress_ann;
pub mod error;
pub mod extract;
pub mod factor;
pub mod matrix;
pub mod metrics;
pub mod options;
mod parallel;
pub mod sampler;
pub mod schur;
pub mod solve;
pub mod work;

pub use basis::HSSBasisID;
pub use error::{HSSError, Result};
pub use factor::{HSSFactors, PartialFactors};
pub use matrix::{HSSMatrix, HSSNode, State};
pub use metrics::{CompressionMetrics, CompressionReport, MetricsSnapshot};
pub use options::{CompressionAlgorithm, HSSOptions};
pub use sampler::{ElementSampler, FnMultiply, FnSampler, MultiplySampler, PointKernel};
pub use schur::{schur_product_direct, SchurUpdate};

pub use hsskit_clustering::{ClusteringAlgorithm, NeighborTable, PartitionTree};
