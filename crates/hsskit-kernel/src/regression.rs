//! Kernel ridge regression with an HSS solver
//!
//! Training solves `(K + lambda I) w = y`. The points are reordered by
//! recursive bisection so that HSS blocks are geometric clusters, the kernel
//! matrix is compressed from its entries with neighbor-guided sampling, and
//! the system is solved with the ULV factorization plus a few steps of
//! iterative refinement.

use crate::error::{KernelError, Result};
use crate::kernels::KernelFunction;
use crate::matrix::KernelMatrix;
use hsskit_clustering::recursive_bisection;
use hsskit_dense::Matrix;
use hsskit_hss::{CompressionReport, HSSMatrix, HSSOptions};
use rayon::prelude::*;

const REFINEMENT_STEPS: usize = 3;

/// Outcome of [`KernelMatrix::fit_hss`]
#[derive(Debug, Clone)]
pub struct KernelFit {
    /// Weights, one per training point in the reordered point order
    pub weights: Matrix<f64>,
    /// `perm[new] = old`: the reordering applied to points and labels
    pub perm: Vec<usize>,
    /// Compression of the kernel matrix
    pub compression: CompressionReport,
    /// `|K w - y| / |y|` after refinement
    pub residual: f64,
}

impl<K: KernelFunction> KernelMatrix<K> {
    /// Fit weights for `labels`
    ///
    /// Reorders the points of `self` and the entries of `labels` in place;
    /// [`KernelFit::perm`] records the permutation.
    pub fn fit_hss(&mut self, labels: &mut [f64], opts: &HSSOptions) -> Result<KernelFit> {
        let n = self.n();
        if labels.len() != n {
            return Err(KernelError::LabelMismatch {
                points: n,
                labels: labels.len(),
            });
        }

        let clustering = recursive_bisection(
            &mut self.points,
            opts.leaf_size,
            opts.clustering_algorithm,
            opts.random_seed,
        )?;
        let permuted: Vec<f64> = clustering.perm.iter().map(|&old| labels[old]).collect();
        labels.copy_from_slice(&permuted);

        let mut h = HSSMatrix::from_tree(&clustering.tree, opts.clone())?;
        let compression = h.compress_kernel(self)?;
        if opts.verbose {
            log::info!(
                "kernel HSS: {n}x{n}, {} levels, rank {}, {:.3} MB, compressed = {}",
                h.levels(),
                h.rank(),
                h.memory() as f64 / 1e6,
                compression.compressed
            );
        }

        let factors = h.factor()?;
        let rhs = Matrix::from_fn(n, 1, |i, _| labels[i]);
        let rhs_norm = rhs.norm_fro();
        let mut weights = rhs.clone();
        h.solve(&factors, &mut weights)?;

        let mut residual = 0.0;
        if rhs_norm > 0.0 {
            let mut r = h.apply(&weights)?;
            r.axpy(-1.0, &rhs);
            residual = r.norm_fro() / rhs_norm;
            for step in 0..REFINEMENT_STEPS {
                if residual < 10.0 * f64::EPSILON {
                    break;
                }
                h.solve(&factors, &mut r)?;
                weights.axpy(-1.0, &r);
                r = h.apply(&weights)?;
                r.axpy(-1.0, &rhs);
                residual = r.norm_fro() / rhs_norm;
                log::debug!("refinement step {step}: relative residual {residual:.3e}");
            }
        }

        Ok(KernelFit {
            weights,
            perm: clustering.perm,
            compression,
            residual,
        })
    }

    /// `sum_i w_i k(x_i, t)` for every test point `t` (rows of `test`)
    ///
    /// `weights` must be in the current point order, as returned by
    /// [`KernelMatrix::fit_hss`].
    pub fn predict(&self, test: &Matrix<f64>, weights: &Matrix<f64>) -> Result<Vec<f64>> {
        if test.ncols() != self.d() {
            return Err(KernelError::DimensionMismatch {
                expected: self.d(),
                actual: test.ncols(),
            });
        }
        if weights.nrows() != self.n() {
            return Err(KernelError::LabelMismatch {
                points: self.n(),
                labels: weights.nrows(),
            });
        }
        Ok((0..test.nrows())
            .into_par_iter()
            .map(|c| {
                let t = test.row(c);
                (0..self.n())
                    .map(|r| weights[[r, 0]] * self.kernel.eval(self.points.row(r), t))
                    .sum()
            })
            .collect())
    }
}
