//! Scalar trait shared by every dense kernel

use num_complex::{Complex32, Complex64};
use num_traits::{Float, One, Zero};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::fmt::Debug;

/// Trait for scalar types used in matrix operations
///
/// Implemented for `f32`, `f64`, `Complex32` and `Complex64`. All norms are
/// reported in `f64` regardless of the working precision. The faer bound lets
/// every dense kernel hand its operands to faer.
pub trait Scalar:
    faer_traits::ComplexField
    + Clone
    + Copy
    + Debug
    + PartialEq
    + Zero
    + One
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Div<Output = Self>
    + std::ops::Neg<Output = Self>
    + std::ops::AddAssign
    + std::ops::SubAssign
    + Send
    + Sync
    + 'static
{
    /// Complex conjugate (identity for real types)
    fn conj(self) -> Self;

    /// Modulus
    fn abs(self) -> f64;

    /// Square of absolute value (for complex numbers, |z|^2)
    fn abs_sq(self) -> f64;

    /// Embed a real number
    fn from_real(x: f64) -> Self;

    /// Check if value is NaN
    fn is_nan(self) -> bool;

    /// Draw a sample with independent standard normal real (and imaginary) parts
    fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// Unit roundoff of the working precision
    fn epsilon() -> f64;

    /// `self / |self|`, or one for zero
    fn signum(self) -> Self {
        let a = self.abs();
        if a == 0.0 {
            Self::one()
        } else {
            self * Self::from_real(1.0 / a)
        }
    }
}

impl Scalar for f64 {
    fn conj(self) -> Self {
        self
    }

    fn abs(self) -> f64 {
        Float::abs(self)
    }

    fn abs_sq(self) -> f64 {
        self * self
    }

    fn from_real(x: f64) -> Self {
        x
    }

    fn is_nan(self) -> bool {
        Float::is_nan(self)
    }

    fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardNormal.sample(rng)
    }

    fn epsilon() -> f64 {
        f64::EPSILON
    }
}

impl Scalar for f32 {
    fn conj(self) -> Self {
        self
    }

    fn abs(self) -> f64 {
        Float::abs(self) as f64
    }

    fn abs_sq(self) -> f64 {
        (self * self) as f64
    }

    fn from_real(x: f64) -> Self {
        x as f32
    }

    fn is_nan(self) -> bool {
        Float::is_nan(self)
    }

    fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardNormal.sample(rng)
    }

    fn epsilon() -> f64 {
        f32::EPSILON as f64
    }
}

impl Scalar for Complex64 {
    fn conj(self) -> Self {
        Complex64::new(self.re, -self.im)
    }

    fn abs(self) -> f64 {
        self.norm()
    }

    fn abs_sq(self) -> f64 {
        self.norm_sqr()
    }

    fn from_real(x: f64) -> Self {
        Complex64::new(x, 0.0)
    }

    fn is_nan(self) -> bool {
        self.re.is_nan() || self.im.is_nan()
    }

    fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Complex64::new(StandardNormal.sample(rng), StandardNormal.sample(rng))
    }

    fn epsilon() -> f64 {
        f64::EPSILON
    }
}

impl Scalar for Complex32 {
    fn conj(self) -> Self {
        Complex32::new(self.re, -self.im)
    }

    fn abs(self) -> f64 {
        self.norm() as f64
    }

    fn abs_sq(self) -> f64 {
        self.norm_sqr() as f64
    }

    fn from_real(x: f64) -> Self {
        Complex32::new(x as f32, 0.0)
    }

    fn is_nan(self) -> bool {
        self.re.is_nan() || self.im.is_nan()
    }

    fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Complex32::new(StandardNormal.sample(rng), StandardNormal.sample(rng))
    }

    fn epsilon() -> f64 {
        f32::EPSILON as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complex_conj_and_abs() {
        let z = Complex64::new(3.0, 4.0);
        assert_eq!(Scalar::conj(z), Complex64::new(3.0, -4.0));
        assert_eq!(Scalar::abs(z), 5.0);
        assert_eq!(Scalar::abs_sq(z), 25.0);
    }

    #[test]
    fn test_signum() {
        assert_eq!(Scalar::signum(-2.0f64), -1.0);
        assert_eq!(Scalar::signum(0.0f64), 1.0);
        let s = Scalar::signum(Complex64::new(0.0, 2.0));
        assert!((s - Complex64::new(0.0, 1.0)).norm() < 1e-15);
    }
}
