//! Entry access and dense expansion
//!
//! Extraction walks the tree with the requested rows and columns, split at
//! each node between its children. Leaves contribute entries of `D`;
//! internal nodes contribute `Ur0 B01 Vr1^H` and `Ur1 B10 Vr0^H`, where `Uri`
//! are the rows of child `i`'s expanded row basis selected by the request.

use crate::error::{HSSError, Result};
use crate::matrix::{Blocks, HSSMatrix, HSSNode};
use crate::parallel::join_if;
use crate::work::WorkDense;
use hsskit_dense::{gemm, mat_mul, matmul_op, vconcat, Matrix, Scalar, Trans};

impl<T: Scalar> HSSMatrix<T> {
    /// Entry `(i, j)`
    pub fn get(&self, i: usize, j: usize) -> Result<T> {
        Ok(self.extract(&[i], &[j])?[[0, 0]])
    }

    /// Submatrix `H(rows, cols)`
    pub fn extract(&self, rows: &[usize], cols: &[usize]) -> Result<Matrix<T>> {
        let mut b = Matrix::zeros(rows.len(), cols.len());
        self.extract_add(rows, cols, &mut b)?;
        Ok(b)
    }

    /// `b += H(rows, cols)`
    pub fn extract_add(&self, rows: &[usize], cols: &[usize], b: &mut Matrix<T>) -> Result<()> {
        self.ensure_usable()?;
        if b.shape() != (rows.len(), cols.len()) {
            return Err(HSSError::DimensionMismatch {
                op: "extract_add",
                expected_rows: rows.len(),
                expected_cols: cols.len(),
                rows: b.nrows(),
                cols: b.ncols(),
            });
        }
        check_indices(rows, self.rows())?;
        check_indices(cols, self.cols())?;
        if rows.is_empty() || cols.is_empty() {
            return Ok(());
        }
        let mut r: Vec<(usize, usize)> = rows.iter().copied().zip(0..).collect();
        let mut c: Vec<(usize, usize)> = cols.iter().copied().zip(0..).collect();
        self.root.extract_rec(&mut r, &mut c, b);
        Ok(())
    }

    /// Expand to a dense matrix
    pub fn dense(&self) -> Result<Matrix<T>> {
        self.ensure_usable()?;
        Ok(self.root.dense_rec(0, self.opts.task_recursion_cutoff).d)
    }
}

fn check_indices(idx: &[usize], size: usize) -> Result<()> {
    match idx.iter().find(|&&i| i >= size) {
        Some(&index) => Err(HSSError::IndexOutOfRange { index, size }),
        None => Ok(()),
    }
}

/// Split `list` into entries below and at or above `split`, keeping their
/// order, and shift the second part to the second child's numbering
fn partition(list: &mut [(usize, usize)], split: usize) -> usize {
    list.sort_by_key(|&(l, _)| l >= split);
    let n0 = list.partition_point(|&(l, _)| l < split);
    list[n0..].iter_mut().for_each(|e| e.0 -= split);
    n0
}

/// `[big0 Ud(..r0); big1 Ud(r0..)]`: a nested basis expanded through the
/// expanded bases of the children
fn nest<T: Scalar>(ud: &Matrix<T>, big0: &Matrix<T>, big1: &Matrix<T>) -> Matrix<T> {
    let r0 = big0.ncols();
    let top = mat_mul(big0, &ud.rows_range(0, r0));
    let bottom = mat_mul(big1, &ud.rows_range(r0, big1.ncols()));
    vconcat(&[&top, &bottom])
}

fn scatter_add<T: Scalar>(b: &mut Matrix<T>, rows: &[(usize, usize)], cols: &[(usize, usize)], x: &Matrix<T>) {
    for (i, &(_, pr)) in rows.iter().enumerate() {
        for (j, &(_, pc)) in cols.iter().enumerate() {
            b[[pr, pc]] += x[[i, j]];
        }
    }
}

impl<T: Scalar> HSSNode<T> {
    /// Add the requested entries of the subtree to `b` and return the
    /// selected rows of the expanded row and column bases, in the order the
    /// lists have after the call
    fn extract_rec(
        &self,
        rows: &mut [(usize, usize)],
        cols: &mut [(usize, usize)],
        b: &mut Matrix<T>,
    ) -> (Matrix<T>, Matrix<T>) {
        match &self.blocks {
            Blocks::Leaf { d } => {
                for &(lr, pr) in rows.iter() {
                    for &(lc, pc) in cols.iter() {
                        b[[pr, pc]] += d[[lr, lc]];
                    }
                }
                let lr: Vec<usize> = rows.iter().map(|e| e.0).collect();
                let lc: Vec<usize> = cols.iter().map(|e| e.0).collect();
                (
                    self.u.dense().select_rows(&lr),
                    self.v.dense().select_rows(&lc),
                )
            }
            Blocks::Internal { children, b01, b10 } => {
                let [c0, c1] = &**children;
                let nr0 = partition(rows, c0.rows);
                let nc0 = partition(cols, c0.cols);
                let (rows0, rows1) = rows.split_at_mut(nr0);
                let (cols0, cols1) = cols.split_at_mut(nc0);
                let (ur0, vr0) = c0.extract_rec(rows0, cols0, b);
                let (ur1, vr1) = c1.extract_rec(rows1, cols1, b);

                if !rows0.is_empty() && !cols1.is_empty() {
                    let x = matmul_op(Trans::N, &mat_mul(&ur0, b01), Trans::C, &vr1);
                    scatter_add(b, rows0, cols1, &x);
                }
                if !rows1.is_empty() && !cols0.is_empty() {
                    let x = matmul_op(Trans::N, &mat_mul(&ur1, b10), Trans::C, &vr0);
                    scatter_add(b, rows1, cols0, &x);
                }
                (
                    nest(&self.u.dense(), &ur0, &ur1),
                    nest(&self.v.dense(), &vr0, &vr1),
                )
            }
        }
    }

    fn dense_rec(&self, depth: usize, cutoff: usize) -> WorkDense<T> {
        match &self.blocks {
            Blocks::Leaf { d } => WorkDense {
                d: d.clone(),
                u_big: self.u.dense(),
                v_big: self.v.dense(),
            },
            Blocks::Internal { children, b01, b10 } => {
                let [c0, c1] = &**children;
                let (w0, w1) = join_if(
                    depth,
                    cutoff,
                    || c0.dense_rec(depth + 1, cutoff),
                    || c1.dense_rec(depth + 1, cutoff),
                );
                let mut d = Matrix::zeros(self.rows, self.cols);
                d.set_block(0, 0, &w0.d);
                d.set_block(c0.rows, c0.cols, &w1.d);
                let mut a01 = Matrix::zeros(c0.rows, c1.cols);
                gemm(Trans::N, &mat_mul(&w0.u_big, b01), Trans::C, &w1.v_big, T::one(), T::zero(), &mut a01);
                d.set_block(0, c0.cols, &a01);
                let mut a10 = Matrix::zeros(c1.rows, c0.cols);
                gemm(Trans::N, &mat_mul(&w1.u_big, b10), Trans::C, &w0.v_big, T::one(), T::zero(), &mut a10);
                d.set_block(c0.rows, 0, &a10);
                WorkDense {
                    d,
                    u_big: nest(&self.u.dense(), &w0.u_big, &w1.u_big),
                    v_big: nest(&self.v.dense(), &w0.v_big, &w1.v_big),
                }
            }
        }
    }

    /// Row and column bases of the node expanded to all of its rows and
    /// columns
    pub(crate) fn expanded_bases(&self) -> (Matrix<T>, Matrix<T>) {
        match self.children() {
            None => (self.u.dense(), self.v.dense()),
            Some([c0, c1]) => {
                let (u0, v0) = c0.expanded_bases();
                let (u1, v1) = c1.expanded_bases();
                (nest(&self.u.dense(), &u0, &u1), nest(&self.v.dense(), &v0, &v1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HSSOptions;

    fn smooth(n: usize) -> Matrix<f64> {
        Matrix::from_fn(n, n, |i, j| {
            let d = (i as f64 - j as f64) / n as f64;
            (-d * d * 4.0).exp() + if i == j { 1.0 } else { 0.0 }
        })
    }

    fn compressed(a: &Matrix<f64>) -> HSSMatrix<f64> {
        let opts = HSSOptions::default().with_leaf_size(8).with_rel_tol(1e-10).with_abs_tol(1e-14);
        HSSMatrix::from_dense(a, opts).unwrap()
    }

    #[test]
    fn test_partition_keeps_order() {
        let mut list = vec![(5, 0), (1, 1), (7, 2), (2, 3)];
        let n0 = partition(&mut list, 4);
        assert_eq!(n0, 2);
        assert_eq!(list, vec![(1, 1), (2, 3), (1, 0), (3, 2)]);
    }

    #[test]
    fn test_extract_scattered_entries() {
        let a = smooth(50);
        let h = compressed(&a);
        let rows = [49, 0, 17, 17, 33];
        let cols = [2, 48, 25];
        let b = h.extract(&rows, &cols).unwrap();
        for (i, &r) in rows.iter().enumerate() {
            for (j, &c) in cols.iter().enumerate() {
                assert!((b[[i, j]] - a[[r, c]]).abs() < 1e-8);
            }
        }
        assert!((h.get(3, 40).unwrap() - a[[3, 40]]).abs() < 1e-8);
    }

    #[test]
    fn test_extract_add_and_errors() {
        let a = smooth(24);
        let h = compressed(&a);
        let mut b = Matrix::from_elem(1, 2, 1.0);
        h.extract_add(&[4], &[4, 5], &mut b).unwrap();
        assert!((b[[0, 0]] - 1.0 - a[[4, 4]]).abs() < 1e-8);
        assert!(matches!(
            h.extract(&[24], &[0]),
            Err(HSSError::IndexOutOfRange { index: 24, size: 24 })
        ));
        assert!(h.extract_add(&[0], &[0], &mut Matrix::zeros(2, 2)).is_err());
        assert_eq!(h.extract(&[], &[1]).unwrap().shape(), (0, 1));
    }

    #[test]
    fn test_dense_and_expanded_bases() {
        let a = smooth(40);
        let h = compressed(&a);
        let d = h.dense().unwrap();
        assert!(d.sub(&a).norm_fro() < 1e-8 * a.norm_fro());

        let c0 = h.child(0).unwrap();
        let (u_big, v_big) = c0.expanded_bases();
        assert_eq!(u_big.shape(), (c0.rows(), c0.u_rank()));
        assert_eq!(v_big.shape(), (c0.cols(), c0.v_rank()));
    }
}
