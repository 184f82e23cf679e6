//! Rank-revealing LU decomposition with full pivoting

use crate::matrix::Matrix;
use crate::scalar::Scalar;

/// Rank-revealing LU decomposition
///
/// Represents a matrix A as:
/// P_row * A * P_col ≈ L * U
///
/// where P_row and P_col are permutation matrices, `L` is `nrows x rank` with
/// unit diagonal and `U` is `rank x ncols`. The neglected Schur complement is
/// bounded entrywise by [`RrLU::last_pivot_error`].
#[derive(Debug, Clone)]
pub struct RrLU<T: Scalar> {
    row_permutation: Vec<usize>,
    col_permutation: Vec<usize>,
    l: Matrix<T>,
    u: Matrix<T>,
    n_pivot: usize,
    /// Modulus of the first rejected pivot (0 if the factorization is exact)
    error: f64,
}

impl<T: Scalar> RrLU<T> {
    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.l.nrows()
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        self.u.ncols()
    }

    /// Number of pivots
    pub fn npivots(&self) -> usize {
        self.n_pivot
    }

    /// Row permutation
    pub fn row_permutation(&self) -> &[usize] {
        &self.row_permutation
    }

    /// Column permutation
    pub fn col_permutation(&self) -> &[usize] {
        &self.col_permutation
    }

    /// Get row indices (selected pivots)
    pub fn row_indices(&self) -> Vec<usize> {
        self.row_permutation[0..self.n_pivot].to_vec()
    }

    /// Get column indices (selected pivots)
    pub fn col_indices(&self) -> Vec<usize> {
        self.col_permutation[0..self.n_pivot].to_vec()
    }

    /// Unit lower factor in pivot order
    pub fn left(&self) -> &Matrix<T> {
        &self.l
    }

    /// Upper factor in pivot order
    pub fn right(&self) -> &Matrix<T> {
        &self.u
    }

    /// Get last pivot error
    pub fn last_pivot_error(&self) -> f64 {
        self.error
    }
}

/// Options for rank-revealing LU decomposition
#[derive(Debug, Clone)]
pub struct RrLUOptions {
    /// Maximum rank
    pub max_rank: usize,
    /// Relative tolerance, compared against the largest pivot
    pub rel_tol: f64,
    /// Absolute tolerance
    pub abs_tol: f64,
}

impl Default for RrLUOptions {
    fn default() -> Self {
        Self {
            max_rank: usize::MAX,
            rel_tol: 1e-14,
            abs_tol: 0.0,
        }
    }
}

/// Perform in-place rank-revealing LU decomposition
///
/// Pivoting stops at the first pivot with modulus below
/// `max(rel_tol * largest_pivot, abs_tol)`, at an exactly zero pivot, or
/// once `max_rank` pivots have been taken.
pub fn rrlu_inplace<T: Scalar>(a: &mut Matrix<T>, options: &RrLUOptions) -> RrLU<T> {
    let (nr, nc) = a.shape();
    let mut row_permutation: Vec<usize> = (0..nr).collect();
    let mut col_permutation: Vec<usize> = (0..nc).collect();
    let max_rank = options.max_rank.min(nr).min(nc);
    let mut max_pivot = 0.0f64;
    let mut error = 0.0f64;
    let mut k = 0;

    while k < max_rank {
        // Find pivot with maximum absolute value in the trailing block
        let mut pivot_row = k;
        let mut pivot_col = k;
        let mut best = -1.0f64;
        for i in k..nr {
            for (j, x) in a.row(i)[k..].iter().enumerate() {
                let v = x.abs_sq();
                if v > best {
                    best = v;
                    pivot_row = i;
                    pivot_col = k + j;
                }
            }
        }
        let pivot_abs = best.sqrt();
        if pivot_abs == 0.0
            || pivot_abs < options.abs_tol
            || (k > 0 && pivot_abs < options.rel_tol * max_pivot)
        {
            error = pivot_abs;
            break;
        }
        max_pivot = max_pivot.max(pivot_abs);

        a.swap_rows(k, pivot_row);
        row_permutation.swap(k, pivot_row);
        a.swap_cols(k, pivot_col);
        col_permutation.swap(k, pivot_col);

        let pivot = a[[k, k]];
        for i in (k + 1)..nr {
            let factor = a[[i, k]] / pivot;
            a[[i, k]] = factor;
            if factor == T::zero() {
                continue;
            }
            for j in (k + 1)..nc {
                let akj = a[[k, j]];
                a[[i, j]] -= factor * akj;
            }
        }
        k += 1;
    }

    let n = k;
    let mut l = Matrix::zeros(nr, n);
    for i in 0..nr {
        for j in 0..n.min(i) {
            l[[i, j]] = a[[i, j]];
        }
        if i < n {
            l[[i, i]] = T::one();
        }
    }
    let mut u = Matrix::zeros(n, nc);
    for i in 0..n {
        for j in i..nc {
            u[[i, j]] = a[[i, j]];
        }
    }

    RrLU {
        row_permutation,
        col_permutation,
        l,
        u,
        n_pivot: n,
        error,
    }
}

/// Perform rank-revealing LU decomposition (non-destructive)
pub fn rrlu<T: Scalar>(a: &Matrix<T>, options: &RrLUOptions) -> RrLU<T> {
    let mut a_copy = a.clone();
    rrlu_inplace(&mut a_copy, options)
}
