//! Interpolative decomposition built on the rank-revealing LU
//!
//! A row ID writes a matrix as `S ≈ P^T [I; E] S(J, :)`: a subset `J` of its
//! rows (the skeleton) and an interpolation matrix `E` that reconstructs the
//! remaining rows from them.

use crate::matrix::Matrix;
use crate::rrlu::{rrlu, RrLUOptions};
use crate::scalar::Scalar;

/// Stopping rule for the interpolative decomposition
#[derive(Debug, Clone, Copy)]
pub struct IdOptions {
    /// Relative tolerance, compared against the largest pivot
    pub rel_tol: f64,
    /// Absolute tolerance
    pub abs_tol: f64,
    /// Hard cap on the number of skeleton rows
    pub max_rank: usize,
}

impl Default for IdOptions {
    fn default() -> Self {
        Self {
            rel_tol: 1e-14,
            abs_tol: 0.0,
            max_rank: usize::MAX,
        }
    }
}

/// Result of a row interpolative decomposition
#[derive(Debug, Clone)]
pub struct RowId<T: Scalar> {
    /// Interpolation matrix, `(nrows - rank) x rank`
    pub e: Matrix<T>,
    /// Row permutation; the first `rank` entries are the skeleton rows
    pub perm: Vec<usize>,
    /// Number of skeleton rows
    pub rank: usize,
    /// Modulus of the first rejected pivot
    pub error: f64,
}

impl<T: Scalar> RowId<T> {
    /// Skeleton rows `J`
    pub fn skeleton(&self) -> &[usize] {
        &self.perm[..self.rank]
    }
}

/// Row interpolative decomposition of `s`
///
/// Computes `E = L21 L11^{-1}` from a fully pivoted LU, so the skeleton rows
/// are reproduced exactly and the other rows carry an error bounded by the
/// neglected Schur complement.
pub fn interpolative_rows<T: Scalar>(s: &Matrix<T>, opts: &IdOptions) -> RowId<T> {
    let m = s.nrows();
    let lu = rrlu(
        s,
        &RrLUOptions {
            max_rank: opts.max_rank,
            rel_tol: opts.rel_tol,
            abs_tol: opts.abs_tol,
        },
    );
    let r = lu.npivots();
    let l = lu.left();

    // L11 is unit lower triangular, so E L11 = L21 is solved right to left
    let mut e = Matrix::zeros(m - r, r);
    for i in 0..(m - r) {
        for j in (0..r).rev() {
            let mut val = l[[r + i, j]];
            for k in (j + 1)..r {
                val -= e[[i, k]] * l[[k, j]];
            }
            e[[i, j]] = val;
        }
    }

    RowId {
        e,
        perm: lu.row_permutation().to_vec(),
        rank: r,
        error: lu.last_pivot_error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blas::mat_mul;
    use crate::matrix::vconcat;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn reconstruct(id: &RowId<f64>, s: &Matrix<f64>) -> Matrix<f64> {
        let skel = s.select_rows(id.skeleton());
        let eye: Matrix<f64> = Matrix::identity(id.rank);
        let stacked = vconcat(&[&eye, &id.e]);
        let permuted = mat_mul(&stacked, &skel);
        // undo the permutation
        let mut out = Matrix::zeros(s.nrows(), s.ncols());
        for (i, &p) in id.perm.iter().enumerate() {
            for j in 0..s.ncols() {
                out[[p, j]] = permuted[[i, j]];
            }
        }
        out
    }

    #[test]
    fn test_id_low_rank_exact() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let a = crate::random::gaussian_matrix::<f64, _>(20, 3, &mut rng);
        let b = crate::random::gaussian_matrix::<f64, _>(3, 15, &mut rng);
        let s = mat_mul(&a, &b);

        let id = interpolative_rows(&s, &IdOptions { rel_tol: 1e-10, ..Default::default() });
        assert_eq!(id.rank, 3);
        assert_eq!(id.e.shape(), (17, 3));
        let rec = reconstruct(&id, &s);
        assert!(rec.sub(&s).norm_fro() / s.norm_fro() < 1e-10);
    }

    #[test]
    fn test_id_respects_max_rank() {
        let s = Matrix::from_fn(12, 12, |i, j| 1.0 / (1.0 + (i as f64 - j as f64).abs()));
        let id = interpolative_rows(
            &s,
            &IdOptions {
                rel_tol: 0.0,
                abs_tol: 0.0,
                max_rank: 4,
            },
        );
        assert_eq!(id.rank, 4);
        assert_eq!(id.perm.len(), 12);
    }

    #[test]
    fn test_id_tolerance_controls_error() {
        // smooth kernel block with fast singular value decay
        let s = Matrix::from_fn(40, 30, |i, j| {
            let x = i as f64 / 40.0;
            let y = 2.0 + j as f64 / 30.0;
            1.0 / (y - x)
        });
        for tol in [1e-4, 1e-8] {
            let id = interpolative_rows(&s, &IdOptions { rel_tol: tol, ..Default::default() });
            let rec = reconstruct(&id, &s);
            let err = rec.sub(&s).norm_fro() / s.norm_fro();
            assert!(err < 100.0 * tol, "tol {tol}: error {err}");
            assert!(id.rank < 20);
        }
    }

    #[test]
    fn test_id_empty_columns() {
        let s: Matrix<f64> = Matrix::zeros(5, 0);
        let id = interpolative_rows(&s, &IdOptions::default());
        assert_eq!(id.rank, 0);
        assert_eq!(id.e.shape(), (5, 0));
    }
}
