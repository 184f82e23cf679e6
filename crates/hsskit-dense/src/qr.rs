//! Householder QR and pivoted orthonormal bases, computed by faer

use crate::blas::{faer_ref, from_faer, gemm, matmul_op, Trans};
use crate::matrix::Matrix;
use crate::scalar::Scalar;

/// `A = Q R` with an explicit unitary `Q`
#[derive(Debug, Clone)]
pub struct HouseholderQr<T: Scalar> {
    q: Matrix<T>,
    r: Matrix<T>,
}

impl<T: Scalar> HouseholderQr<T> {
    /// Factor `a` (any shape)
    pub fn new(a: &Matrix<T>) -> Self {
        let (m, n) = a.shape();
        let q = if m == 0 || n == 0 {
            Matrix::identity(m)
        } else {
            from_faer(faer_ref(a).qr().compute_Q().as_ref())
        };
        let mut r = matmul_op(Trans::C, &q, Trans::N, a);
        for i in 1..m {
            for j in 0..i.min(n) {
                r[[i, j]] = T::zero();
            }
        }
        Self { q, r }
    }

    /// Upper trapezoidal factor (`m x n`)
    pub fn r(&self) -> &Matrix<T> {
        &self.r
    }

    /// Full unitary factor (`m x m`)
    pub fn q(&self) -> Matrix<T> {
        self.q.clone()
    }

    /// `b <- Q b`
    pub fn apply_q(&self, b: &mut Matrix<T>) {
        *b = matmul_op(Trans::N, &self.q, Trans::N, b);
    }

    /// `b <- Q^H b`
    pub fn apply_qh(&self, b: &mut Matrix<T>) {
        *b = matmul_op(Trans::C, &self.q, Trans::N, b);
    }
}

/// Orthonormal basis for the numerical range of `a`
///
/// Column-pivoted QR. Step `k` is kept while the largest norm of the part of a
/// column not yet spanned exceeds `max(rel_tol * max_col_norm(a), abs_tol)`,
/// up to `max_rank` columns.
pub fn orthonormal_basis<T: Scalar>(
    a: &Matrix<T>,
    rel_tol: f64,
    abs_tol: f64,
    max_rank: usize,
) -> Matrix<T> {
    let (m, n) = a.shape();
    if m == 0 || n == 0 {
        return Matrix::zeros(m, 0);
    }
    let scale = (0..n).map(|j| a.col_norm(j)).fold(0.0, f64::max);
    let tol = (rel_tol * scale).max(abs_tol).max(f64::MIN_POSITIVE);

    let q = from_faer(faer_ref(a).col_piv_qr().compute_thin_Q().as_ref());
    let p = q.ncols();
    // rows k.. of Q^H A hold what the first k columns of Q leave unexplained
    let w = matmul_op(Trans::C, &q, Trans::N, a);
    let mut tail = vec![0.0; n];
    let mut remaining = vec![0.0; p];
    for k in (0..p).rev() {
        for (j, t) in tail.iter_mut().enumerate() {
            *t += w[[k, j]].abs_sq();
        }
        remaining[k] = tail.iter().copied().fold(0.0, f64::max).sqrt();
    }
    let rank = remaining
        .iter()
        .take(max_rank.min(p))
        .take_while(|&&r| r > tol)
        .count();
    q.cols_range(0, rank)
}

/// Residual `b - Q (Q^H b)` of projecting the columns of `b` onto `range(q)`
pub fn projection_residual<T: Scalar>(q: &Matrix<T>, b: &Matrix<T>) -> Matrix<T> {
    let coeffs = matmul_op(Trans::C, q, Trans::N, b);
    let mut r = b.clone();
    gemm(Trans::N, q, Trans::N, &coeffs, -T::one(), T::one(), &mut r);
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blas::mat_mul;
    use crate::matrix::from_vec2d;
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64;

    fn assert_unitary<T: Scalar>(q: &Matrix<T>) {
        let qhq = matmul_op(Trans::C, q, Trans::N, q);
        let eye: Matrix<T> = Matrix::identity(q.ncols());
        assert!(qhq.sub(&eye).norm_fro() < 1e-12);
    }

    #[test]
    fn test_qr_reconstructs() {
        let a = from_vec2d(vec![
            vec![1.0, 2.0],
            vec![3.0, 4.0],
            vec![5.0, 7.0],
        ]);
        let qr = HouseholderQr::new(&a);
        let q = qr.q();
        assert_unitary(&q);
        let qr_prod = mat_mul(&q, qr.r());
        assert!(qr_prod.sub(&a).norm_fro() < 1e-12);
        assert_abs_diff_eq!(qr.r()[[2, 1]], 0.0);
        assert_abs_diff_eq!(qr.r()[[1, 0]], 0.0);
    }

    #[test]
    fn test_qr_complex_and_apply() {
        let a = Matrix::from_fn(4, 3, |i, j| Complex64::new((i + j) as f64, (i * j) as f64 - 1.0));
        let qr = HouseholderQr::new(&a);
        let q = qr.q();
        assert_unitary(&q);
        assert!(mat_mul(&q, qr.r()).sub(&a).norm_fro() < 1e-12);

        let mut b = a.clone();
        qr.apply_qh(&mut b);
        assert!(b.sub(qr.r()).norm_fro() < 1e-12);
    }

    #[test]
    fn test_qr_empty_columns() {
        let a: Matrix<f64> = Matrix::zeros(3, 0);
        let qr = HouseholderQr::new(&a);
        assert_eq!(qr.q(), Matrix::identity(3));
    }

    #[test]
    fn test_orthonormal_basis_rank_deficient() {
        // rank 2
        let u = from_vec2d(vec![vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 2.0], vec![3.0, 1.0]]);
        let v = from_vec2d(vec![vec![1.0, 2.0, 0.0, 1.0, 5.0], vec![0.0, 1.0, 1.0, -1.0, 2.0]]);
        let a = mat_mul(&u, &v);
        let q = orthonormal_basis(&a, 1e-12, 0.0, usize::MAX);
        assert_eq!(q.ncols(), 2);
        assert_unitary(&q);
        assert!(projection_residual(&q, &a).norm_fro() < 1e-10);
    }

    #[test]
    fn test_orthonormal_basis_rank_cap_and_tolerance() {
        let a = Matrix::from_fn(12, 8, |i, j| 1.0 / (1.0 + i as f64 + j as f64));
        let capped = orthonormal_basis(&a, 0.0, 0.0, 3);
        assert_eq!(capped.shape(), (12, 3));
        assert_unitary(&capped);

        let q = orthonormal_basis(&a, 1e-6, 0.0, usize::MAX);
        assert!(q.ncols() < 8);
        let res = projection_residual(&q, &a);
        let scale = (0..8).map(|j| a.col_norm(j)).fold(0.0, f64::max);
        assert!((0..8).all(|j| res.col_norm(j) <= 1e-6 * scale * 10.0));
        assert_eq!(orthonormal_basis(&Matrix::<f64>::zeros(5, 4), 1e-8, 0.0, 4).ncols(), 0);
    }
}
