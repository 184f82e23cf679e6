//! Error types for hsskit-kernel

use thiserror::Error;

/// Errors of kernel construction, fitting and prediction
#[derive(Debug, Error)]
pub enum KernelError {
    /// Unrecognized kernel name
    #[error("Kernel type '{name}' not recognized (expected Gauss or Laplace)")]
    UnknownKernel { name: String },

    /// Number of labels differs from the number of training points
    #[error("{labels} labels for {points} training points")]
    LabelMismatch { points: usize, labels: usize },

    /// Point dimension differs from the training data
    #[error("Points have dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// HSS construction or solve error
    #[error("HSS error: {0}")]
    Hss(#[from] hsskit_hss::HSSError),

    /// Clustering error
    #[error("Clustering error: {0}")]
    Clustering(#[from] hsskit_clustering::ClusteringError),
}

/// Result type for kernel operations
pub type Result<T> = std::result::Result<T, KernelError>;
