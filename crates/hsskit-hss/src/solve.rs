//! Solve with ULV factors
//!
//! The upward sweep eliminates `s - r` unknowns per node and hands a reduced
//! right-hand side to the parent; the contribution of eliminated unknowns to
//! the couplings travels along as `ft1`. The root solves the last reduced
//! system and the downward sweep recovers the unknowns through `Q`.

use crate::error::{HSSError, Result};
use crate::factor::{FactorKind, HSSFactors, NodeFactors};
use crate::matrix::{Blocks, HSSMatrix, HSSNode};
use crate::parallel::join_if;
use crate::work::WorkSolve;
use hsskit_dense::{gemm, mat_mul, matmul_op, solve_lower_in_place, vconcat, Matrix, Scalar, Trans};

impl<T: Scalar> HSSMatrix<T> {
    /// Overwrite `b` with `H^{-1} b`
    pub fn solve(&self, factors: &HSSFactors<T>, b: &mut Matrix<T>) -> Result<()> {
        if factors.size() != self.rows() || self.rows() != self.cols() {
            return Err(HSSError::DimensionMismatch {
                op: "solve",
                expected_rows: self.rows(),
                expected_cols: self.cols(),
                rows: factors.size(),
                cols: factors.size(),
            });
        }
        if b.nrows() != self.rows() {
            return Err(HSSError::DimensionMismatch {
                op: "solve",
                expected_rows: self.rows(),
                expected_cols: b.ncols(),
                rows: b.nrows(),
                cols: b.ncols(),
            });
        }
        self.root
            .solve_with(&factors.root, b, self.opts.task_recursion_cutoff)
    }
}

impl<T: Scalar> HSSNode<T> {
    /// Solve with the subtree treated as a full matrix factored into `f`
    pub(crate) fn solve_with(&self, f: &NodeFactors<T>, b: &mut Matrix<T>, cutoff: usize) -> Result<()> {
        let mut w = WorkSolve::default();
        self.forward_solve(f, b, 0, &mut w, 0, cutoff);
        let x = self.backward_solve(f, &w, Matrix::zeros(0, b.ncols()), 0, cutoff)?;
        *b = x;
        Ok(())
    }

    fn forward_solve(
        &self,
        f: &NodeFactors<T>,
        b: &Matrix<T>,
        offset: usize,
        w: &mut WorkSolve<T>,
        depth: usize,
        cutoff: usize,
    ) {
        let rhs = match &self.blocks {
            Blocks::Leaf { .. } => b.rows_range(offset, self.rows),
            Blocks::Internal { children, b01, b10 } => {
                let [c0, c1] = &**children;
                w.c = vec![WorkSolve::default(), WorkSolve::default()];
                let (w0, w1) = w.c.split_at_mut(1);
                join_if(
                    depth,
                    cutoff,
                    || c0.forward_solve(&f.children[0], b, offset, &mut w0[0], depth + 1, cutoff),
                    || {
                        c1.forward_solve(&f.children[1], b, offset + c0.rows, &mut w1[0], depth + 1, cutoff)
                    },
                );
                let (w0, w1) = (&w.c[0], &w.c[1]);
                let mut top = w0.rhs1.clone();
                gemm(Trans::N, b01, Trans::N, &w1.ft1, -T::one(), T::one(), &mut top);
                let mut bottom = w1.rhs1.clone();
                gemm(Trans::N, b10, Trans::N, &w0.ft1, -T::one(), T::one(), &mut bottom);
                vconcat(&[&top, &bottom])
            }
        };

        match &f.kind {
            FactorKind::Root { .. } => w.rhs1 = rhs,
            FactorKind::Eliminated { l, d10, vq0, .. } => {
                let k = l.nrows();
                let bt = self.u.apply_omega(&rhs);
                let mut z0 = bt.rows_range(0, k);
                solve_lower_in_place(l, &mut z0);
                let mut rhs1 = bt.rows_range(k, bt.nrows() - k);
                gemm(Trans::N, d10, Trans::N, &z0, -T::one(), T::one(), &mut rhs1);
                let mut ft1 = matmul_op(Trans::C, vq0, Trans::N, &z0);
                if let [w0, w1] = w.c.as_slice() {
                    ft1.axpy(T::one(), &self.v.apply_c(&vconcat(&[&w0.ft1, &w1.ft1])));
                }
                w.z0 = z0;
                w.rhs1 = rhs1;
                w.ft1 = ft1;
            }
        }
    }

    /// Unknowns of the subtree, given the values `z1` of the node's
    /// skeleton unknowns decided by the parent
    fn backward_solve(
        &self,
        f: &NodeFactors<T>,
        w: &WorkSolve<T>,
        z1: Matrix<T>,
        depth: usize,
        cutoff: usize,
    ) -> Result<Matrix<T>> {
        let zloc = match &f.kind {
            FactorKind::Root { lu } => lu.solve(&w.rhs1)?,
            FactorKind::Eliminated { q, .. } => mat_mul(q, &vconcat(&[&w.z0, &z1])),
        };
        match self.children() {
            None => Ok(zloc),
            Some([c0, c1]) => {
                let r0 = c0.u_rank();
                let z10 = zloc.rows_range(0, r0);
                let z11 = zloc.rows_range(r0, zloc.nrows() - r0);
                let (x0, x1) = join_if(
                    depth,
                    cutoff,
                    || c0.backward_solve(&f.children[0], &w.c[0], z10, depth + 1, cutoff),
                    || c1.backward_solve(&f.children[1], &w.c[1], z11, depth + 1, cutoff),
                );
                Ok(vconcat(&[&x0?, &x1?]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{HSSMatrix, HSSOptions};
    use hsskit_dense::{mat_mul, Matrix};

    fn spd(n: usize) -> Matrix<f64> {
        Matrix::from_fn(n, n, |i, j| {
            let d = (i as f64 - j as f64) / n as f64;
            (-d * d * 10.0).exp() + if i == j { 1.0 } else { 0.0 }
        })
    }

    #[test]
    fn test_solve_residual() {
        let a = spd(96);
        let opts = HSSOptions::default().with_leaf_size(12).with_rel_tol(1e-10).with_abs_tol(1e-14);
        let h = HSSMatrix::from_dense(&a, opts).unwrap();
        let f = h.factor().unwrap();
        let x_true = Matrix::from_fn(96, 2, |i, j| ((i + 3 * j) % 7) as f64 - 3.0);
        let mut b = mat_mul(&a, &x_true);
        h.solve(&f, &mut b).unwrap();
        let err = b.sub(&x_true).norm_fro() / x_true.norm_fro();
        assert!(err < 1e-7, "relative error {err}");
    }

    #[test]
    fn test_solve_on_single_leaf() {
        let a = spd(7);
        let h = HSSMatrix::from_dense(&a, HSSOptions::default()).unwrap();
        let f = h.factor().unwrap();
        let mut b = Matrix::from_elem(7, 1, 1.0);
        h.solve(&f, &mut b).unwrap();
        let r = mat_mul(&a, &b).sub(&Matrix::from_elem(7, 1, 1.0));
        assert!(r.norm_fro() < 1e-12);
    }

    #[test]
    fn test_solve_rejects_foreign_factors() {
        let h1 = HSSMatrix::from_dense(&spd(16), HSSOptions::default().with_leaf_size(4)).unwrap();
        let h2 = HSSMatrix::from_dense(&spd(20), HSSOptions::default().with_leaf_size(4)).unwrap();
        let f2 = h2.factor().unwrap();
        assert!(h1.solve(&f2, &mut Matrix::zeros(16, 1)).is_err());
        let f1 = h1.factor().unwrap();
        assert!(h1.solve(&f1, &mut Matrix::zeros(15, 1)).is_err());
    }
}
