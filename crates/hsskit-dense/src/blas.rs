//! Matrix products and triangular solves through faer
//!
//! [`Matrix`] stores its entries row-major, so faer sees it as a view with row
//! stride `ncols` and column stride 1. No data is copied to call into faer.

use crate::matrix::Matrix;
use crate::scalar::Scalar;
use faer::linalg::matmul::matmul as faer_matmul;
use faer::linalg::triangular_solve::{solve_lower_triangular_in_place, solve_upper_triangular_in_place};
use faer::{Accum, MatMut, MatRef, Par};

/// Operation applied to an operand before multiplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trans {
    /// Use the matrix as is
    #[default]
    N,
    /// Transpose
    T,
    /// Conjugate transpose
    C,
}

impl Trans {
    /// Shape of `op(a)`
    pub fn shape<T>(self, a: &Matrix<T>) -> (usize, usize)
    where
        T: Clone,
    {
        match self {
            Trans::N => (a.nrows(), a.ncols()),
            Trans::T | Trans::C => (a.ncols(), a.nrows()),
        }
    }
}

/// Borrow `a` as a faer view
pub(crate) fn faer_ref<T: Scalar>(a: &Matrix<T>) -> MatRef<'_, T> {
    let (m, n) = a.shape();
    // SAFETY: the buffer holds `m * n` entries with row stride `n`
    unsafe { MatRef::from_raw_parts(a.as_slice().as_ptr(), m, n, n as isize, 1) }
}

/// Borrow `a` as a mutable faer view
pub(crate) fn faer_mut<T: Scalar>(a: &mut Matrix<T>) -> MatMut<'_, T> {
    let (m, n) = a.shape();
    // SAFETY: as in `faer_ref`, and the view holds the only borrow of the buffer
    unsafe { MatMut::from_raw_parts_mut(a.as_mut_slice().as_mut_ptr(), m, n, n as isize, 1) }
}

/// Copy a faer view into a [`Matrix`]
pub(crate) fn from_faer<T: Scalar>(a: MatRef<'_, T>) -> Matrix<T> {
    Matrix::from_fn(a.nrows(), a.ncols(), |i, j| a[(i, j)])
}

// `transpose` and `adjoint` change the view type, so each combination of
// operand modes is its own call.
macro_rules! with_op {
    ($op:expr, $m:expr, |$v:ident| $body:expr) => {
        match $op {
            Trans::N => {
                let $v = $m;
                $body
            }
            Trans::T => {
                let $v = $m.transpose();
                $body
            }
            Trans::C => {
                let $v = $m.adjoint();
                $body
            }
        }
    };
}

/// General matrix product `c = alpha * op(a) * op(b) + beta * c`
///
/// Panics if the operand shapes do not conform.
pub fn gemm<T: Scalar>(
    ta: Trans,
    a: &Matrix<T>,
    tb: Trans,
    b: &Matrix<T>,
    alpha: T,
    beta: T,
    c: &mut Matrix<T>,
) {
    let (m, k) = ta.shape(a);
    let (kb, n) = tb.shape(b);
    assert_eq!(k, kb, "gemm: inner dimensions differ ({k} vs {kb})");
    assert_eq!(c.shape(), (m, n), "gemm: output has wrong shape");

    let replace = beta == T::zero();
    if !replace && beta != T::one() {
        c.scale(beta);
    }
    if m == 0 || n == 0 {
        return;
    }
    if k == 0 {
        if replace {
            c.as_mut_slice().iter_mut().for_each(|x| *x = T::zero());
        }
        return;
    }

    let accum = if replace { Accum::Replace } else { Accum::Add };
    let (a, b) = (faer_ref(a), faer_ref(b));
    let mut dst = faer_mut(c);
    with_op!(ta, a, |av| with_op!(tb, b, |bv| faer_matmul(
        &mut dst,
        accum,
        av,
        bv,
        alpha,
        Par::Seq
    )))
}

/// `op(a) * op(b)` as a new matrix
pub fn matmul_op<T: Scalar>(ta: Trans, a: &Matrix<T>, tb: Trans, b: &Matrix<T>) -> Matrix<T> {
    let (m, _) = ta.shape(a);
    let (_, n) = tb.shape(b);
    let mut c = Matrix::zeros(m, n);
    gemm(ta, a, tb, b, T::one(), T::zero(), &mut c);
    c
}

/// Matrix multiplication: A * B
pub fn mat_mul<T: Scalar>(a: &Matrix<T>, b: &Matrix<T>) -> Matrix<T> {
    matmul_op(Trans::N, a, Trans::N, b)
}

/// Solve `L X = B` in place for lower triangular `L` (diagonal used as stored)
pub fn solve_lower_in_place<T: Scalar>(l: &Matrix<T>, b: &mut Matrix<T>) {
    let n = l.nrows();
    assert_eq!(l.ncols(), n);
    assert_eq!(b.nrows(), n);
    if n == 0 || b.ncols() == 0 {
        return;
    }
    solve_lower_triangular_in_place(faer_ref(l), faer_mut(b), Par::Seq);
}

/// Solve `U X = B` in place for upper triangular `U`
pub fn solve_upper_in_place<T: Scalar>(u: &Matrix<T>, b: &mut Matrix<T>) {
    let n = u.nrows();
    assert_eq!(u.ncols(), n);
    assert_eq!(b.nrows(), n);
    if n == 0 || b.ncols() == 0 {
        return;
    }
    solve_upper_triangular_in_place(faer_ref(u), faer_mut(b), Par::Seq);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::from_vec2d;
    use num_complex::Complex64;

    #[test]
    fn test_mat_mul() {
        let a = from_vec2d(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = from_vec2d(vec![vec![5.0, 6.0], vec![7.0, 8.0]]);
        let c = mat_mul(&a, &b);

        assert_eq!(c[[0, 0]], 19.0);
        assert_eq!(c[[0, 1]], 22.0);
        assert_eq!(c[[1, 0]], 43.0);
        assert_eq!(c[[1, 1]], 50.0);
    }

    #[test]
    fn test_gemm_transpose_modes() {
        let a = from_vec2d(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let b = from_vec2d(vec![vec![1.0, 0.0, 1.0], vec![0.0, 1.0, 0.0]]);
        // a^T * b is 3x3
        let c = matmul_op(Trans::T, &a, Trans::N, &b);
        assert_eq!(c.shape(), (3, 3));
        assert_eq!(c[[0, 0]], 1.0);
        assert_eq!(c[[2, 1]], 6.0);

        // accumulate: c = 2 a b^T + c
        let mut d = from_vec2d(vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
        gemm(Trans::N, &a, Trans::T, &b, 2.0, 1.0, &mut d);
        assert_eq!(d[[0, 0]], 1.0 + 2.0 * 4.0);
        assert_eq!(d[[1, 1]], 1.0 + 2.0 * 5.0);
    }

    #[test]
    fn test_gemm_conjugate() {
        let i = Complex64::new(0.0, 1.0);
        let a = from_vec2d(vec![vec![i]]);
        let c = matmul_op(Trans::C, &a, Trans::N, &a);
        assert_eq!(c[[0, 0]], Complex64::new(1.0, 0.0));
        let t = matmul_op(Trans::T, &a, Trans::N, &a);
        assert_eq!(t[[0, 0]], Complex64::new(-1.0, 0.0));
    }

    #[test]
    fn test_triangular_solves() {
        let l = from_vec2d(vec![vec![2.0, 0.0], vec![1.0, 4.0]]);
        let mut b = from_vec2d(vec![vec![2.0], vec![9.0]]);
        solve_lower_in_place(&l, &mut b);
        assert_eq!(b[[0, 0]], 1.0);
        assert_eq!(b[[1, 0]], 2.0);

        let u = l.transpose();
        let mut b = from_vec2d(vec![vec![4.0], vec![8.0]]);
        solve_upper_in_place(&u, &mut b);
        assert_eq!(b[[1, 0]], 2.0);
        assert_eq!(b[[0, 0]], 1.0);
    }

    #[test]
    fn test_gemm_general_beta_and_empty_inner() {
        let a = from_vec2d(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let mut c = from_vec2d(vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
        gemm(Trans::C, &a, Trans::N, &a, 1.0, 0.5, &mut c);
        assert_eq!(c[[0, 0]], 0.5 + 10.0);
        assert_eq!(c[[0, 1]], 0.5 + 14.0);

        let e: Matrix<f64> = Matrix::zeros(2, 0);
        let f: Matrix<f64> = Matrix::zeros(0, 3);
        let mut d = Matrix::from_fn(2, 3, |_, _| 7.0);
        gemm(Trans::N, &e, Trans::N, &f, 1.0, 0.0, &mut d);
        assert_eq!(d, Matrix::zeros(2, 3));
    }
}
