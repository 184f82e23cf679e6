//! Kernel matrices `K(i, j) = k(x_i, x_j) + lambda delta_ij`

use crate::kernels::KernelFunction;
use hsskit_dense::Matrix;
use hsskit_hss::{ElementSampler, PointKernel};
use rayon::prelude::*;

/// Regularized kernel matrix over a point set (points as rows)
#[derive(Debug, Clone)]
pub struct KernelMatrix<K> {
    pub(crate) points: Matrix<f64>,
    pub(crate) kernel: K,
    pub(crate) lambda: f64,
}

impl<K: KernelFunction> KernelMatrix<K> {
    pub fn new(points: Matrix<f64>, kernel: K, lambda: f64) -> Self {
        Self { points, kernel, lambda }
    }

    /// Number of points
    pub fn n(&self) -> usize {
        self.points.nrows()
    }

    /// Dimension of the points
    pub fn d(&self) -> usize {
        self.points.ncols()
    }

    /// Points in their current order
    pub fn points(&self) -> &Matrix<f64> {
        &self.points
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Diagonal shift
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Entry `(i, j)`
    pub fn eval(&self, i: usize, j: usize) -> f64 {
        let k = self.kernel.eval(self.points.row(i), self.points.row(j));
        if i == j {
            k + self.lambda
        } else {
            k
        }
    }
}

impl<K: KernelFunction> ElementSampler<f64> for KernelMatrix<K> {
    fn element(&self, i: usize, j: usize) -> f64 {
        self.eval(i, j)
    }

    fn extract(&self, rows: &[usize], cols: &[usize]) -> Matrix<f64> {
        let data: Vec<f64> = rows
            .par_iter()
            .flat_map_iter(|&i| cols.iter().map(move |&j| self.eval(i, j)))
            .collect();
        Matrix::from_fn(rows.len(), cols.len(), |a, b| data[a * cols.len() + b])
    }
}

impl<K: KernelFunction> PointKernel<f64> for KernelMatrix<K> {
    fn points(&self) -> &Matrix<f64> {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::GaussKernel;

    #[test]
    fn test_diagonal_shift_and_batched_extract() {
        let pts = Matrix::from_fn(5, 2, |i, j| (i + j) as f64 * 0.1);
        let k = KernelMatrix::new(pts, GaussKernel { h: 1.0 }, 0.5);
        assert_eq!(k.n(), 5);
        assert_eq!(k.d(), 2);
        assert!((k.eval(2, 2) - 1.5).abs() < 1e-15);
        let b = k.extract(&[4, 0, 2], &[2, 3]);
        assert_eq!(b.shape(), (3, 2));
        for (a, &i) in [4, 0, 2].iter().enumerate() {
            for (c, &j) in [2, 3].iter().enumerate() {
                assert_eq!(b[[a, c]], k.eval(i, j));
            }
        }
    }
}
