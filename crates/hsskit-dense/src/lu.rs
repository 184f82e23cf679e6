//! LU factorization with partial pivoting

use crate::blas::{faer_mut, faer_ref};
use crate::error::{DenseError, Result};
use crate::matrix::Matrix;
use crate::scalar::Scalar;
use faer::linalg::solvers::{PartialPivLu, Solve};
use std::fmt;
use std::sync::Arc;

/// `P A = L U` computed by faer
///
/// Singular pivots are not detected: a zero pivot produces non-finite values
/// in the solution, which callers observe as a large residual.
#[derive(Clone)]
pub struct LuFactorization<T: Scalar> {
    /// `None` for the empty matrix
    lu: Option<Arc<PartialPivLu<T>>>,
    n: usize,
}

impl<T: Scalar> fmt::Debug for LuFactorization<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuFactorization").field("n", &self.n).finish()
    }
}

impl<T: Scalar> LuFactorization<T> {
    /// Factor a square matrix
    pub fn new(a: &Matrix<T>) -> Result<Self> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(DenseError::NotSquare {
                nrows: n,
                ncols: a.ncols(),
            });
        }
        Ok(Self {
            lu: (n > 0).then(|| Arc::new(faer_ref(a).partial_piv_lu())),
            n,
        })
    }

    /// Factor a square matrix, consuming it
    pub fn new_in_place(a: Matrix<T>) -> Result<Self> {
        Self::new(&a)
    }

    /// Order of the factored matrix
    pub fn size(&self) -> usize {
        self.n
    }

    /// Solve `A X = B` in place
    pub fn solve_in_place(&self, b: &mut Matrix<T>) -> Result<()> {
        let n = self.size();
        if b.nrows() != n {
            return Err(DenseError::DimensionMismatch {
                op: "lu solve",
                lhs_rows: n,
                lhs_cols: n,
                rhs_rows: b.nrows(),
                rhs_cols: b.ncols(),
            });
        }
        if let Some(lu) = &self.lu {
            if b.ncols() > 0 {
                lu.solve_in_place(faer_mut(b));
            }
        }
        Ok(())
    }

    /// Solve `A X = B`, returning `X`
    pub fn solve(&self, b: &Matrix<T>) -> Result<Matrix<T>> {
        let mut x = b.clone();
        self.solve_in_place(&mut x)?;
        Ok(x)
    }

    /// Bytes held by the factors
    pub fn memory(&self) -> usize {
        self.n * self.n * std::mem::size_of::<T>() + self.n * std::mem::size_of::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blas::mat_mul;
    use crate::matrix::from_vec2d;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_lu_solve() {
        let a = from_vec2d(vec![
            vec![0.0, 2.0, 1.0],
            vec![1.0, 1.0, 0.0],
            vec![3.0, 0.0, 1.0],
        ]);
        let x = from_vec2d(vec![vec![1.0, 2.0], vec![-1.0, 0.5], vec![2.0, 3.0]]);
        let b = mat_mul(&a, &x);

        let lu = LuFactorization::new(&a).unwrap();
        let sol = lu.solve(&b).unwrap();
        for i in 0..3 {
            for j in 0..2 {
                assert_abs_diff_eq!(sol[[i, j]], x[[i, j]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_lu_rejects_rectangular() {
        let a: Matrix<f64> = Matrix::zeros(2, 3);
        assert!(matches!(
            LuFactorization::new(&a),
            Err(DenseError::NotSquare { .. })
        ));
    }

    #[test]
    fn test_lu_empty() {
        let a: Matrix<f64> = Matrix::zeros(0, 0);
        let lu = LuFactorization::new(&a).unwrap();
        let mut b: Matrix<f64> = Matrix::zeros(0, 2);
        lu.solve_in_place(&mut b).unwrap();
        assert_eq!(b.shape(), (0, 2));
    }

    #[test]
    fn test_lu_complex_needs_pivoting() {
        use num_complex::Complex64;
        let a = Matrix::from_fn(4, 4, |i, j| {
            if i == j {
                Complex64::new(0.0, 0.0)
            } else {
                Complex64::new((i + 2 * j) as f64, 1.0 - i as f64)
            }
        });
        let x = Matrix::from_fn(4, 2, |i, j| Complex64::new(i as f64, j as f64 + 1.0));
        let b = mat_mul(&a, &x);
        let lu = LuFactorization::new_in_place(a).unwrap();
        assert_eq!(lu.size(), 4);
        let mut sol = b.clone();
        lu.solve_in_place(&mut sol).unwrap();
        assert!(sol.sub(&x).norm_fro() < 1e-10);
        assert!(lu.solve_in_place(&mut Matrix::zeros(3, 1)).is_err());
    }
}
