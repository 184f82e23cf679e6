//! Dense linear algebra kernels for hierarchical matrices
//!
//! This crate provides the dense building blocks used by the HSS engine.
//! Products, LU and QR are computed by faer on views of [`Matrix`]:
//! - [`Matrix`]: row-major owned matrix indexed with `m[[i, j]]`
//! - [`gemm`]: matrix product with transpose/conjugate modes
//! - [`LuFactorization`]: partial-pivot LU for square systems
//! - [`HouseholderQr`]: Householder QR with an explicit unitary factor
//! - [`rrlu`] and [`interpolative_rows`]: rank-revealing LU and the row
//!   interpolative decomposition built on it
//!
//! # Example
//!
//! ```
//! use hsskit_dense::{interpolative_rows, IdOptions, Matrix};
//!
//! // rank-1 matrix
//! let s = Matrix::from_fn(6, 4, |i, j| (i + 1) as f64 * (j + 2) as f64);
//! let id = interpolative_rows(&s, &IdOptions::default());
//! assert_eq!(id.rank, 1);
//! ```

pub mod blas;
pub mod error;
pub mod id;
pub mod lu;
pub mod matrix;
pub mod qr;
pub mod random;
pub mod rrlu;
pub mod scalar;

// Re-export main types
pub use blas::{gemm, mat_mul, matmul_op, solve_lower_in_place, solve_upper_in_place, Trans};
pub use error::{DenseError, Result};
pub use id::{interpolative_rows, IdOptions, RowId};
pub use lu::LuFactorization;
pub use matrix::{block_diag, eye, from_vec2d, hconcat, vconcat, zeros, Matrix};
pub use qr::{orthonormal_basis, projection_residual, HouseholderQr};
pub use random::gaussian_matrix;
pub use rrlu::{rrlu, rrlu_inplace, RrLU, RrLUOptions};
pub use scalar::Scalar;
