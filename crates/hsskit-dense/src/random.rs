//! Random test and sketching matrices

use crate::matrix::Matrix;
use crate::scalar::Scalar;
use rand::Rng;

/// Matrix with independent standard normal entries
pub fn gaussian_matrix<T: Scalar, R: Rng + ?Sized>(
    nrows: usize,
    ncols: usize,
    rng: &mut R,
) -> Matrix<T> {
    Matrix::from_fn(nrows, ncols, |_, _| T::sample_normal(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_gaussian_matrix_is_seeded() {
        let a: Matrix<f64> = gaussian_matrix(4, 3, &mut ChaCha8Rng::seed_from_u64(1));
        let b: Matrix<f64> = gaussian_matrix(4, 3, &mut ChaCha8Rng::seed_from_u64(1));
        let c: Matrix<f64> = gaussian_matrix(4, 3, &mut ChaCha8Rng::seed_from_u64(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
