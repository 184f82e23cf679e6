//! Input protocols of the compression algorithms
//!
//! Compression never sees where the matrix comes from. The sampling path
//! needs products with random matrices ([`MultiplySampler`]) plus individual
//! entries ([`ElementSampler`]); the ANN path needs entries and the point
//! cloud behind them ([`PointKernel`]).

use hsskit_dense::{gemm, Matrix, Scalar, Trans};

/// Access to individual entries `A(i, j)`
pub trait ElementSampler<T: Scalar>: Sync {
    /// Entry `(i, j)`
    fn element(&self, i: usize, j: usize) -> T;

    /// Submatrix `A(rows, cols)`
    fn extract(&self, rows: &[usize], cols: &[usize]) -> Matrix<T> {
        Matrix::from_fn(rows.len(), cols.len(), |a, b| self.element(rows[a], cols[b]))
    }
}

/// Products of the matrix and its adjoint with random matrices
pub trait MultiplySampler<T: Scalar>: Sync {
    /// `sr = A * rr` and `sc = A^H * rc`
    fn sample(&self, rr: &Matrix<T>, rc: &Matrix<T>, sr: &mut Matrix<T>, sc: &mut Matrix<T>);
}

/// Element sampler for a matrix defined by points, such as a kernel matrix
///
/// The ANN path assumes `A` is symmetric.
pub trait PointKernel<T: Scalar>: ElementSampler<T> {
    /// Points as rows, `n x d`
    fn points(&self) -> &Matrix<f64>;
}

impl<T: Scalar> ElementSampler<T> for Matrix<T> {
    fn element(&self, i: usize, j: usize) -> T {
        self[[i, j]]
    }

    fn extract(&self, rows: &[usize], cols: &[usize]) -> Matrix<T> {
        self.submatrix(rows, cols)
    }
}

impl<T: Scalar> MultiplySampler<T> for Matrix<T> {
    fn sample(&self, rr: &Matrix<T>, rc: &Matrix<T>, sr: &mut Matrix<T>, sc: &mut Matrix<T>) {
        gemm(Trans::N, self, Trans::N, rr, T::one(), T::zero(), sr);
        gemm(Trans::C, self, Trans::N, rc, T::one(), T::zero(), sc);
    }
}

/// Element sampler from a closure `(i, j) -> A(i, j)`
pub struct FnSampler<F>(pub F);

impl<T, F> ElementSampler<T> for FnSampler<F>
where
    T: Scalar,
    F: Fn(usize, usize) -> T + Sync,
{
    fn element(&self, i: usize, j: usize) -> T {
        (self.0)(i, j)
    }
}

/// Multiply sampler from a closure `(rr, rc, sr, sc)`
pub struct FnMultiply<F>(pub F);

impl<T, F> MultiplySampler<T> for FnMultiply<F>
where
    T: Scalar,
    F: Fn(&Matrix<T>, &Matrix<T>, &mut Matrix<T>, &mut Matrix<T>) + Sync,
{
    fn sample(&self, rr: &Matrix<T>, rc: &Matrix<T>, sr: &mut Matrix<T>, sc: &mut Matrix<T>) {
        (self.0)(rr, rc, sr, sc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsskit_dense::{from_vec2d, mat_mul};

    #[test]
    fn test_matrix_samplers() {
        let a = from_vec2d(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        assert_eq!(a.element(2, 1), 6.0);
        assert_eq!(ElementSampler::extract(&a, &[2, 0], &[1]), from_vec2d(vec![vec![6.0], vec![2.0]]));

        let rr = from_vec2d(vec![vec![1.0], vec![-1.0]]);
        let rc = from_vec2d(vec![vec![1.0], vec![0.0], vec![1.0]]);
        let mut sr = Matrix::zeros(3, 1);
        let mut sc = Matrix::zeros(2, 1);
        a.sample(&rr, &rc, &mut sr, &mut sc);
        assert_eq!(sr, mat_mul(&a, &rr));
        assert_eq!(sc, from_vec2d(vec![vec![6.0], vec![8.0]]));
    }

    #[test]
    fn test_closure_sampler_extract() {
        let f = FnSampler(|i: usize, j: usize| (10 * i + j) as f64);
        let m = f.extract(&[1, 3], &[0, 2]);
        assert_eq!(m, from_vec2d(vec![vec![10.0, 12.0], vec![30.0, 32.0]]));
    }
}
