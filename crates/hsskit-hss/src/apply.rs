//! Products with an HSS matrix
//!
//! Two passes over the tree. The upward pass projects the operand on the
//! input bases (`V^H x` for `H x`, `U^H x` for `H^H x`). The downward pass
//! couples sibling projections through `B01`/`B10`, expands them with the
//! output bases and adds the diagonal blocks at the leaves.

use crate::error::{HSSError, Result};
use crate::matrix::{Blocks, HSSMatrix, HSSNode};
use crate::parallel::join_if;
use crate::work::WorkApply;
use hsskit_dense::{gemm, vconcat, Matrix, Scalar, Trans};

impl<T: Scalar> HSSMatrix<T> {
    /// `H b`
    pub fn apply(&self, b: &Matrix<T>) -> Result<Matrix<T>> {
        self.apply_op(Trans::N, b)
    }

    /// `H^H b`
    pub fn apply_c(&self, b: &Matrix<T>) -> Result<Matrix<T>> {
        self.apply_op(Trans::C, b)
    }

    fn apply_op(&self, op: Trans, b: &Matrix<T>) -> Result<Matrix<T>> {
        self.ensure_usable()?;
        let (rows, cols) = match op {
            Trans::N => (self.rows(), self.cols()),
            _ => (self.cols(), self.rows()),
        };
        if b.nrows() != cols {
            return Err(HSSError::DimensionMismatch {
                op: if op == Trans::N { "apply" } else { "apply_c" },
                expected_rows: cols,
                expected_cols: b.ncols(),
                rows: b.nrows(),
                cols: b.ncols(),
            });
        }
        let cutoff = self.opts.task_recursion_cutoff;
        let mut w = WorkApply::new(0);
        self.root.apply_fwd(op, b, &mut w, 0, cutoff);
        let y = self
            .root
            .apply_bwd(op, b, Matrix::zeros(0, b.ncols()), &w, 0, cutoff);
        debug_assert_eq!(y.nrows(), rows);
        Ok(y)
    }
}

impl<T: Scalar> HSSNode<T> {
    /// Input dimension of the node for `op`
    fn in_dim(&self, op: Trans) -> usize {
        if op == Trans::N {
            self.cols
        } else {
            self.rows
        }
    }

    /// `Vbig^H x` for `op = N`, `Ubig^H x` otherwise, without expanding the
    /// nested bases
    pub(crate) fn project(&self, op: Trans, x: &Matrix<T>, cutoff: usize) -> Matrix<T> {
        let mut w = WorkApply::new(0);
        self.apply_fwd(op, x, &mut w, 0, cutoff);
        w.tmp1
    }

    fn apply_fwd(&self, op: Trans, b: &Matrix<T>, w: &mut WorkApply<T>, depth: usize, cutoff: usize) {
        let in_basis = if op == Trans::N { &self.v } else { &self.u };
        match &self.blocks {
            Blocks::Leaf { .. } => {
                let x = b.rows_range(w.offset, self.in_dim(op));
                w.tmp1 = in_basis.apply_c(&x);
            }
            Blocks::Internal { children, .. } => {
                let [c0, c1] = &**children;
                w.c = vec![
                    WorkApply::new(w.offset),
                    WorkApply::new(w.offset + c0.in_dim(op)),
                ];
                let (w0, w1) = w.c.split_at_mut(1);
                join_if(
                    depth,
                    cutoff,
                    || c0.apply_fwd(op, b, &mut w0[0], depth + 1, cutoff),
                    || c1.apply_fwd(op, b, &mut w1[0], depth + 1, cutoff),
                );
                let x = vconcat(&[&w.c[0].tmp1, &w.c[1].tmp1]);
                w.tmp1 = in_basis.apply_c(&x);
            }
        }
    }

    /// Rows of the product owned by this subtree, given the contribution
    /// `tmp2` that enters through the output basis
    fn apply_bwd(
        &self,
        op: Trans,
        b: &Matrix<T>,
        tmp2: Matrix<T>,
        w: &WorkApply<T>,
        depth: usize,
        cutoff: usize,
    ) -> Matrix<T> {
        let out_basis = if op == Trans::N { &self.u } else { &self.v };
        let ut = out_basis.apply(&tmp2);
        match &self.blocks {
            Blocks::Leaf { d } => {
                let x = b.rows_range(w.offset, self.in_dim(op));
                let mut y = ut;
                let op_d = if op == Trans::N { Trans::N } else { Trans::C };
                gemm(op_d, d, Trans::N, &x, T::one(), T::one(), &mut y);
                y
            }
            Blocks::Internal { children, b01, b10 } => {
                let [c0, c1] = &**children;
                let (r0, r1) = if op == Trans::N {
                    (c0.u_rank(), c1.u_rank())
                } else {
                    (c0.v_rank(), c1.v_rank())
                };
                let mut t0 = ut.rows_range(0, r0);
                let mut t1 = ut.rows_range(r0, r1);
                let (w0, w1) = (&w.c[0], &w.c[1]);
                match op {
                    Trans::N => {
                        gemm(Trans::N, b01, Trans::N, &w1.tmp1, T::one(), T::one(), &mut t0);
                        gemm(Trans::N, b10, Trans::N, &w0.tmp1, T::one(), T::one(), &mut t1);
                    }
                    _ => {
                        gemm(Trans::C, b10, Trans::N, &w1.tmp1, T::one(), T::one(), &mut t0);
                        gemm(Trans::C, b01, Trans::N, &w0.tmp1, T::one(), T::one(), &mut t1);
                    }
                }
                let (y0, y1) = join_if(
                    depth,
                    cutoff,
                    || c0.apply_bwd(op, b, t0, w0, depth + 1, cutoff),
                    || c1.apply_bwd(op, b, t1, w1, depth + 1, cutoff),
                );
                vconcat(&[&y0, &y1])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{HSSMatrix, HSSOptions};
    use hsskit_dense::{mat_mul, Matrix};

    fn kernel(n: usize) -> Matrix<f64> {
        Matrix::from_fn(n, n, |i, j| 1.0 / (1.0 + (i as f64 - j as f64).abs()))
    }

    #[test]
    fn test_apply_matches_dense_product() {
        let a = kernel(48);
        let opts = HSSOptions::default().with_leaf_size(8).with_rel_tol(1e-10).with_abs_tol(1e-14);
        let h = HSSMatrix::from_dense(&a, opts).unwrap();
        let x = Matrix::from_fn(48, 3, |i, j| ((i * 7 + j * 3) % 11) as f64 - 5.0);
        let y = h.apply(&x).unwrap();
        let err = y.sub(&mat_mul(&a, &x)).norm_fro() / mat_mul(&a, &x).norm_fro();
        assert!(err < 1e-8, "relative error {err}");
    }

    #[test]
    fn test_apply_c_on_rectangular() {
        let a = Matrix::from_fn(40, 24, |i, j| (-((i as f64 / 40.0 - j as f64 / 24.0).powi(2))).exp());
        let opts = HSSOptions::default().with_leaf_size(6).with_rel_tol(1e-10).with_abs_tol(1e-14);
        let h = HSSMatrix::from_dense(&a, opts).unwrap();
        let x = Matrix::from_fn(40, 2, |i, j| (i + j) as f64 / 40.0);
        let y = h.apply_c(&x).unwrap();
        assert_eq!(y.shape(), (24, 2));
        let expected = mat_mul(&a.adjoint(), &x);
        assert!(y.sub(&expected).norm_fro() < 1e-8 * expected.norm_fro());
    }

    #[test]
    fn test_apply_errors() {
        let h: HSSMatrix<f64> = HSSMatrix::new(10, 10, HSSOptions::default());
        assert!(h.apply(&Matrix::zeros(10, 1)).is_err());
        let h = HSSMatrix::from_dense(&kernel(10), HSSOptions::default()).unwrap();
        assert!(h.apply(&Matrix::zeros(9, 1)).is_err());
    }
}
