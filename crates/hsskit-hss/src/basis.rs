//! Interpolative bases of HSS nodes
//!
//! A basis maps `rank` skeleton coefficients to `rows` rows as
//! `U = P^T [I; E]`: the skeleton rows of `U` are the identity and the
//! remaining rows are interpolated through `E`.

use hsskit_dense::{gemm, IdOptions, Matrix, RowId, Scalar, Trans};

/// Row (or column) basis of one HSS node in interpolative form
#[derive(Debug, Clone, PartialEq)]
pub struct HSSBasisID<T: Scalar> {
    /// Interpolation matrix, `(rows - rank) x rank`
    e: Matrix<T>,
    /// `perm[i]` is the row of `U` that holds row `i` of `[I; E]`
    perm: Vec<usize>,
}

impl<T: Scalar> Default for HSSBasisID<T> {
    fn default() -> Self {
        Self::zero_rank(0)
    }
}

impl<T: Scalar> HSSBasisID<T> {
    /// Basis of rank zero over `rows` rows
    pub fn zero_rank(rows: usize) -> Self {
        Self {
            e: Matrix::zeros(rows, 0),
            perm: (0..rows).collect(),
        }
    }

    /// Full-rank basis `U = I`
    pub fn identity(n: usize) -> Self {
        Self {
            e: Matrix::zeros(0, n),
            perm: (0..n).collect(),
        }
    }

    /// Basis from a row interpolative decomposition of a sample matrix
    pub fn from_row_id(id: RowId<T>) -> Self {
        Self {
            e: id.e,
            perm: id.perm,
        }
    }

    /// Interpolative basis of the rows of `s`
    pub fn from_sample(s: &Matrix<T>, opts: &IdOptions) -> Self {
        Self::from_row_id(hsskit_dense::interpolative_rows(s, opts))
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.perm.len()
    }

    /// Number of skeleton rows
    pub fn rank(&self) -> usize {
        self.e.ncols()
    }

    /// Interpolation matrix `E`
    pub fn e(&self) -> &Matrix<T> {
        &self.e
    }

    /// Row permutation
    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    /// Local indices of the skeleton rows
    pub fn skeleton(&self) -> &[usize] {
        &self.perm[..self.rank()]
    }

    /// `U` as a dense `rows x rank` matrix
    pub fn dense(&self) -> Matrix<T> {
        self.apply(&Matrix::identity(self.rank()))
    }

    /// `U * b`
    pub fn apply(&self, b: &Matrix<T>) -> Matrix<T> {
        let r = self.rank();
        assert_eq!(b.nrows(), r, "basis apply: operand has {} rows, rank is {r}", b.nrows());
        let mut out = Matrix::zeros(self.rows(), b.ncols());
        let eb = hsskit_dense::mat_mul(&self.e, b);
        for (i, &p) in self.perm.iter().enumerate() {
            let src = if i < r { b.row(i) } else { eb.row(i - r) };
            out.row_mut(p).copy_from_slice(src);
        }
        out
    }

    /// `U^H * b`
    pub fn apply_c(&self, b: &Matrix<T>) -> Matrix<T> {
        let r = self.rank();
        assert_eq!(b.nrows(), self.rows(), "basis apply_c: row count differs");
        let z = b.select_rows(&self.perm);
        let mut out = z.rows_range(0, r);
        gemm(
            Trans::C,
            &self.e,
            Trans::N,
            &z.rows_range(r, self.rows() - r),
            T::one(),
            T::one(),
            &mut out,
        );
        out
    }

    /// `Omega * b` with `Omega = [[-E, I], [I, 0]] P`
    ///
    /// `Omega U = [0; I]`, so the first `rows - rank` rows of the result do
    /// not see anything coupled through this basis.
    pub fn apply_omega(&self, b: &Matrix<T>) -> Matrix<T> {
        let r = self.rank();
        let z = b.select_rows(&self.perm);
        let mut top = z.rows_range(r, self.rows() - r);
        gemm(
            Trans::N,
            &self.e,
            Trans::N,
            &z.rows_range(0, r),
            -T::one(),
            T::one(),
            &mut top,
        );
        hsskit_dense::vconcat(&[&top, &z.rows_range(0, r)])
    }

    /// Check the shape invariants
    pub fn check(&self) -> bool {
        let mut seen = vec![false; self.rows()];
        for &p in &self.perm {
            if p >= seen.len() || seen[p] {
                return false;
            }
            seen[p] = true;
        }
        self.rank() <= self.rows() && self.e.nrows() + self.rank() == self.rows()
    }

    /// Bytes held by `E` and the permutation
    pub fn memory(&self) -> usize {
        self.nonzeros() * std::mem::size_of::<T>() + self.perm.len() * std::mem::size_of::<usize>()
    }

    /// Stored entries of `E`
    pub fn nonzeros(&self) -> usize {
        self.e.nrows() * self.e.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsskit_dense::{from_vec2d, mat_mul, matmul_op};

    fn sample_basis() -> HSSBasisID<f64> {
        HSSBasisID {
            e: from_vec2d(vec![vec![0.5, -1.0], vec![2.0, 0.25]]),
            perm: vec![2, 0, 3, 1],
        }
    }

    #[test]
    fn test_dense_layout() {
        let u = sample_basis().dense();
        // skeleton rows 2 and 0 are unit rows
        assert_eq!(u.row(2), &[1.0, 0.0]);
        assert_eq!(u.row(0), &[0.0, 1.0]);
        assert_eq!(u.row(3), &[0.5, -1.0]);
        assert_eq!(u.row(1), &[2.0, 0.25]);
    }

    #[test]
    fn test_apply_matches_dense() {
        let basis = sample_basis();
        let u = basis.dense();
        let b = from_vec2d(vec![vec![1.0, 2.0, 3.0], vec![-1.0, 0.5, 4.0]]);
        assert_eq!(basis.apply(&b), mat_mul(&u, &b));

        let c = Matrix::from_fn(4, 2, |i, j| (i * 2 + j) as f64 - 3.0);
        let expected = matmul_op(Trans::C, &u, Trans::N, &c);
        assert!(basis.apply_c(&c).sub(&expected).norm_fro() < 1e-14);
    }

    #[test]
    fn test_omega_annihilates_basis() {
        let basis = sample_basis();
        let ou = basis.apply_omega(&basis.dense());
        let expected = from_vec2d(vec![
            vec![0.0, 0.0],
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
        ]);
        assert!(ou.sub(&expected).norm_fro() < 1e-14);
    }

    #[test]
    fn test_identity_and_zero_rank() {
        let id: HSSBasisID<f64> = HSSBasisID::identity(3);
        assert_eq!(id.rank(), 3);
        assert_eq!(id.dense(), Matrix::identity(3));
        assert!(id.check());

        let z: HSSBasisID<f64> = HSSBasisID::zero_rank(4);
        assert_eq!(z.rank(), 0);
        assert_eq!(z.apply(&Matrix::zeros(0, 2)), Matrix::zeros(4, 2));
        assert!(z.check());
        assert!(sample_basis().check());
    }
}
