//! Low-rank Schur complement update of a 2x2 partitioned HSS matrix
//!
//! With `H = [H00 H01; H10 H11]` and `H00` factored, the Schur complement is
//!
//! ```text
//! S = H11 - H10 H00^{-1} H01 = H11 - Theta DUB01 Phi^H
//! Theta = U1big B10,  DUB01 = V0big^H H00^{-1} U0big B01,  Phi = V1big
//! ```
//!
//! so only three small dense factors are needed to sample `S`. The indirect
//! product never forms the tall `Theta` and `Phi`: samples `H10 R1` and
//! `H01^H R1` of the off-diagonal blocks span the same columns.

use crate::error::{HSSError, Result};
use crate::factor::PartialFactors;
use crate::matrix::{Blocks, HSSMatrix};
use hsskit_dense::{
    gemm, mat_mul, matmul_op, solve_lower_in_place, HouseholderQr, Matrix, Scalar, Trans,
};

/// Factors of the low-rank term `Theta DUB01 Phi^H` of a Schur complement
#[derive(Debug, Clone)]
pub struct SchurUpdate<T: Scalar> {
    /// `U1big B10`, rows of `H11` by the rank of `U0`
    pub theta: Matrix<T>,
    /// `V0big^H H00^{-1} U0big B01`
    pub dub01: Matrix<T>,
    /// `V1big`, columns of `H11` by the rank of `V1`
    pub phi: Matrix<T>,
}

impl<T: Scalar> HSSMatrix<T> {
    /// Low-rank factors of `H10 H00^{-1} H01` from a partial factorization
    pub fn schur_update(&self, pf: &PartialFactors<T>) -> Result<SchurUpdate<T>> {
        self.ensure_usable()?;
        let Blocks::Internal { children, b01, b10 } = &self.root.blocks else {
            return Err(HSSError::InvalidTree {
                message: "Schur update needs a root with two children".to_string(),
            });
        };
        let [c0, c1] = &**children;
        if pf.h00.size() != c0.rows || pf.vhat.shape() != (c0.v_rank(), c0.u_rank()) {
            return Err(HSSError::DimensionMismatch {
                op: "schur_update",
                expected_rows: c0.v_rank(),
                expected_cols: c0.u_rank(),
                rows: pf.vhat.nrows(),
                cols: pf.vhat.ncols(),
            });
        }
        let (u1_big, v1_big) = c1.expanded_bases();
        Ok(SchurUpdate {
            theta: mat_mul(&u1_big, b10),
            dub01: mat_mul(&pf.vhat, b01),
            phi: v1_big,
        })
    }
}

impl<T: Scalar> HSSMatrix<T> {
    /// Subtract `Theta DUB01 Phi^H` from samples of `H11` using samples of
    /// the off-diagonal blocks instead of `Theta` and `Phi`
    ///
    /// `sr2 = H10 r1` and `sc2 = H01^H r1` for a random `r1` with at least as
    /// many columns as the ranks of the root's child bases. `sr = H11 r2` and
    /// `sc = H11^H r2` become samples of the Schur complement `S` and of
    /// `S^H`, as with [`schur_product_direct`].
    #[allow(clippy::too_many_arguments)]
    pub fn schur_product_indirect(
        &self,
        dub01: &Matrix<T>,
        r1: &Matrix<T>,
        r2: &Matrix<T>,
        sr2: &Matrix<T>,
        sc2: &Matrix<T>,
        sr: &mut Matrix<T>,
        sc: &mut Matrix<T>,
    ) -> Result<()> {
        self.ensure_usable()?;
        if self.rows() != self.cols() {
            return Err(HSSError::NotSquare {
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        let Blocks::Internal { children, b01, b10 } = &self.root.blocks else {
            return Err(HSSError::InvalidTree {
                message: "Schur product needs a root with two children".to_string(),
            });
        };
        let [c0, c1] = &**children;
        let (n0, n1) = (c0.rows, c1.rows);
        let d1 = r1.ncols();
        let checks = [
            ("schur_product_indirect dub01", (c0.v_rank(), c1.v_rank()), dub01.shape()),
            ("schur_product_indirect r1", (n0, d1.max(c0.v_rank()).max(c1.v_rank())), r1.shape()),
            ("schur_product_indirect sr2", (n1, d1), sr2.shape()),
            ("schur_product_indirect sc2", (n1, d1), sc2.shape()),
            ("schur_product_indirect r2", (n1, r2.ncols()), r2.shape()),
            ("schur_product_indirect sr", (n1, r2.ncols()), sr.shape()),
            ("schur_product_indirect sc", (n1, r2.ncols()), sc.shape()),
        ];
        for (op, expected, actual) in checks {
            if expected != actual {
                return Err(HSSError::DimensionMismatch {
                    op,
                    expected_rows: expected.0,
                    expected_cols: expected.1,
                    rows: actual.0,
                    cols: actual.1,
                });
            }
        }

        let cutoff = self.opts.task_recursion_cutoff;
        // sr2 = Theta (V0big^H r1) and sc2 = Phi (B01^H U0big^H r1)
        let m_theta = c0.project(Trans::N, r1, cutoff);
        let m_phi = matmul_op(Trans::C, b01, Trans::N, &c0.project(Trans::C, r1, cutoff));

        let x = mat_mul(dub01, &c1.project(Trans::N, r2, cutoff));
        let theta_h_r2 = matmul_op(Trans::C, b10, Trans::N, &c1.project(Trans::C, r2, cutoff));
        let y = matmul_op(Trans::C, dub01, Trans::N, &theta_h_r2);

        gemm(Trans::N, sr2, Trans::N, &min_norm_solve(&m_theta, &x), -T::one(), T::one(), sr);
        gemm(Trans::N, sc2, Trans::N, &min_norm_solve(&m_phi, &y), -T::one(), T::one(), sc);
        Ok(())
    }
}

/// Minimum norm `c` with `m c = rhs` for a wide `m` of full row rank
fn min_norm_solve<T: Scalar>(m: &Matrix<T>, rhs: &Matrix<T>) -> Matrix<T> {
    let r = m.nrows();
    // m^H = Q R, so m = R^H Q^H and c = Q R^{-H} rhs
    let qr = HouseholderQr::new(&m.adjoint());
    let mut z = rhs.clone();
    solve_lower_in_place(&qr.r().rows_range(0, r).adjoint(), &mut z);
    mat_mul(&qr.q().cols_range(0, r), &z)
}

impl<T: Scalar> SchurUpdate<T> {
    /// Subtract the low-rank term from samples of `H11`
    ///
    /// `sr = H11 r` and `sc = H11^H r` become samples of the Schur
    /// complement `S` and of `S^H`.
    pub fn product_direct(&self, r: &Matrix<T>, sr: &mut Matrix<T>, sc: &mut Matrix<T>) {
        schur_product_direct(&self.theta, &self.dub01, &self.phi, r, sr, sc);
    }
}

/// `sr -= Theta (DUB01 (Phi^H r))` and `sc -= Phi (DUB01^H (Theta^H r))`
pub fn schur_product_direct<T: Scalar>(
    theta: &Matrix<T>,
    dub01: &Matrix<T>,
    phi: &Matrix<T>,
    r: &Matrix<T>,
    sr: &mut Matrix<T>,
    sc: &mut Matrix<T>,
) {
    let t = mat_mul(dub01, &matmul_op(Trans::C, phi, Trans::N, r));
    gemm(Trans::N, theta, Trans::N, &t, -T::one(), T::one(), sr);
    let t = matmul_op(Trans::C, dub01, Trans::N, &matmul_op(Trans::C, theta, Trans::N, r));
    gemm(Trans::N, phi, Trans::N, &t, -T::one(), T::one(), sc);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HSSOptions;
    use hsskit_dense::LuFactorization;

    fn coupled(n: usize) -> Matrix<f64> {
        Matrix::from_fn(n, n, |i, j| {
            let d = (i as f64 - j as f64) / n as f64;
            1.0 / (1.0 + 20.0 * d * d) + if i == j { 3.0 } else { 0.0 }
        })
    }

    #[test]
    fn test_schur_complement_samples() {
        let n = 48;
        let a = coupled(n);
        let opts = HSSOptions::default().with_leaf_size(6).with_rel_tol(1e-10).with_abs_tol(1e-14);
        let h = HSSMatrix::from_dense(&a, opts).unwrap();
        let pf = h.partial_factor().unwrap();
        let upd = h.schur_update(&pf).unwrap();

        let h0 = n / 2;
        let idx0: Vec<usize> = (0..h0).collect();
        let idx1: Vec<usize> = (h0..n).collect();
        let a00 = a.submatrix(&idx0, &idx0);
        let a01 = a.submatrix(&idx0, &idx1);
        let a10 = a.submatrix(&idx1, &idx0);
        let a11 = a.submatrix(&idx1, &idx1);
        let s = a11.sub(&mat_mul(&a10, &LuFactorization::new(&a00).unwrap().solve(&a01).unwrap()));

        let r = Matrix::from_fn(n - h0, 3, |i, j| ((i * 5 + j) % 9) as f64 - 4.0);
        let mut sr = mat_mul(&a11, &r);
        let mut sc = mat_mul(&a11.adjoint(), &r);
        upd.product_direct(&r, &mut sr, &mut sc);

        let expected_r = mat_mul(&s, &r);
        let expected_c = mat_mul(&s.adjoint(), &r);
        assert!(sr.sub(&expected_r).norm_fro() < 1e-7 * expected_r.norm_fro());
        assert!(sc.sub(&expected_c).norm_fro() < 1e-7 * expected_c.norm_fro());
    }

    #[test]
    fn test_schur_update_rejects_mismatched_factors() {
        let h = HSSMatrix::from_dense(&coupled(32), HSSOptions::default().with_leaf_size(4)).unwrap();
        let other = HSSMatrix::from_dense(&coupled(40), HSSOptions::default().with_leaf_size(4)).unwrap();
        let pf = other.partial_factor().unwrap();
        assert!(h.schur_update(&pf).is_err());
    }

    #[test]
    fn test_indirect_product_matches_direct() {
        use hsskit_dense::gaussian_matrix;
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;

        let n = 48;
        let h0 = n / 2;
        let opts = HSSOptions::default().with_leaf_size(6).with_rel_tol(1e-10).with_abs_tol(1e-14);
        let h = HSSMatrix::from_dense(&coupled(n), opts).unwrap();
        let pf = h.partial_factor().unwrap();
        let upd = h.schur_update(&pf).unwrap();

        let idx0: Vec<usize> = (0..h0).collect();
        let idx1: Vec<usize> = (h0..n).collect();
        let h10 = h.extract(&idx1, &idx0).unwrap();
        let h01 = h.extract(&idx0, &idx1).unwrap();
        let h11 = h.extract(&idx1, &idx1).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let r1: Matrix<f64> = gaussian_matrix(h0, h0 + 4, &mut rng);
        let r2: Matrix<f64> = gaussian_matrix(n - h0, 5, &mut rng);
        let sr2 = mat_mul(&h10, &r1);
        let sc2 = mat_mul(&h01.adjoint(), &r1);

        let (mut sr_d, mut sc_d) = (mat_mul(&h11, &r2), mat_mul(&h11.adjoint(), &r2));
        upd.product_direct(&r2, &mut sr_d, &mut sc_d);
        let (mut sr_i, mut sc_i) = (mat_mul(&h11, &r2), mat_mul(&h11.adjoint(), &r2));
        h.schur_product_indirect(&upd.dub01, &r1, &r2, &sr2, &sc2, &mut sr_i, &mut sc_i)
            .unwrap();

        assert!(sr_i.sub(&sr_d).norm_fro() < 1e-8 * sr_d.norm_fro());
        assert!(sc_i.sub(&sc_d).norm_fro() < 1e-8 * sc_d.norm_fro());
    }

    #[test]
    fn test_indirect_product_checks_shapes() {
        let h = HSSMatrix::from_dense(&coupled(32), HSSOptions::default().with_leaf_size(4)).unwrap();
        let pf = h.partial_factor().unwrap();
        let upd = h.schur_update(&pf).unwrap();
        let r1 = Matrix::zeros(16, 40);
        let r2 = Matrix::zeros(16, 2);
        let (mut sr, mut sc) = (Matrix::zeros(16, 2), Matrix::zeros(16, 2));
        let short = Matrix::zeros(15, 40);
        assert!(matches!(
            h.schur_product_indirect(&upd.dub01, &r1, &r2, &short, &short, &mut sr, &mut sc),
            Err(HSSError::DimensionMismatch { .. })
        ));
    }
}
