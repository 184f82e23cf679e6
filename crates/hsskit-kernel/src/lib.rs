//! Kernel matrices and kernel ridge regression on HSS solvers
//!
//! A [`KernelMatrix`] evaluates `k(x_i, x_j) + lambda delta_ij` on demand and
//! plugs into HSS compression as an element sampler backed by a point
//! cloud. [`KernelMatrix::fit_hss`] trains regression weights with an HSS
//! factorization and [`KernelMatrix::predict`] evaluates the model.

pub mod error;
pub mod kernels;
pub mod matrix;
pub mod regression;

pub use error::{KernelError, Result};
pub use kernels::{GaussKernel, KernelFunction, KernelType, LaplaceKernel};
pub use matrix::KernelMatrix;
pub use regression::KernelFit;
