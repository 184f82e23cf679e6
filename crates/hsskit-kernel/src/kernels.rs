//! Kernel functions

use crate::error::{KernelError, Result};
use hsskit_clustering::{euclidean_distance_squared, norm1_distance};
use std::fmt;
use std::str::FromStr;

/// A positive definite function of two points
pub trait KernelFunction: Send + Sync {
    /// `k(x, y)`
    fn eval(&self, x: &[f64], y: &[f64]) -> f64;
}

impl<K: KernelFunction + ?Sized> KernelFunction for Box<K> {
    fn eval(&self, x: &[f64], y: &[f64]) -> f64 {
        (**self).eval(x, y)
    }
}

/// Gauss (radial basis function) kernel `exp(-|x - y|^2 / (2 h^2))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussKernel {
    /// Width
    pub h: f64,
}

impl KernelFunction for GaussKernel {
    fn eval(&self, x: &[f64], y: &[f64]) -> f64 {
        (-euclidean_distance_squared(x, y) / (2.0 * self.h * self.h)).exp()
    }
}

/// Laplace kernel `exp(-|x - y|_1 / h)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaplaceKernel {
    /// Width
    pub h: f64,
}

impl KernelFunction for LaplaceKernel {
    fn eval(&self, x: &[f64], y: &[f64]) -> f64 {
        (-norm1_distance(x, y) / self.h).exp()
    }
}

/// Kernel families selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelType {
    #[default]
    Gauss,
    Laplace,
}

impl KernelType {
    /// Kernel of this family with width `h`
    pub fn build(self, h: f64) -> Box<dyn KernelFunction> {
        match self {
            KernelType::Gauss => Box::new(GaussKernel { h }),
            KernelType::Laplace => Box::new(LaplaceKernel { h }),
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KernelType::Gauss => "Gauss",
            KernelType::Laplace => "Laplace",
        })
    }
}

impl FromStr for KernelType {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Gauss" => Ok(KernelType::Gauss),
            "Laplace" => Ok(KernelType::Laplace),
            _ => Err(KernelError::UnknownKernel { name: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_values() {
        let x = [0.0, 0.0];
        let y = [1.0, 2.0];
        assert_relative_eq!(GaussKernel { h: 1.0 }.eval(&x, &y), (-2.5f64).exp());
        assert_relative_eq!(LaplaceKernel { h: 2.0 }.eval(&x, &y), (-1.5f64).exp());
        assert_relative_eq!(GaussKernel { h: 0.3 }.eval(&y, &y), 1.0);
    }

    #[test]
    fn test_kernel_type_names() {
        assert_eq!("Gauss".parse::<KernelType>().unwrap(), KernelType::Gauss);
        assert_eq!("Laplace".parse::<KernelType>().unwrap(), KernelType::Laplace);
        assert!(matches!(
            "gauss".parse::<KernelType>(),
            Err(KernelError::UnknownKernel { .. })
        ));
        for k in [KernelType::Gauss, KernelType::Laplace] {
            assert_eq!(k.to_string().parse::<KernelType>().unwrap(), k);
        }
    }

    #[test]
    fn test_build_dispatches_on_type() {
        let x = [0.0];
        let y = [1.0];
        let g = KernelType::Gauss.build(1.0);
        let l = KernelType::Laplace.build(1.0);
        assert_relative_eq!(g.eval(&x, &y), (-0.5f64).exp());
        assert_relative_eq!(l.eval(&x, &y), (-1.0f64).exp());
    }
}
