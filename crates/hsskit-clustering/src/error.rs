//! Error types for hsskit-clustering

use thiserror::Error;

/// Errors that can occur while clustering points or searching neighbors
#[derive(Debug, Error)]
pub enum ClusteringError {
    /// Unrecognized clustering algorithm name
    #[error("Clustering algorithm '{name}' not recognized")]
    UnknownAlgorithm { name: String },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Binary matrix file has the wrong size
    #[error("File {path} holds {actual} bytes, expected {expected}")]
    FileSize {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Dense kernel error
    #[error("Dense error: {0}")]
    Dense(#[from] hsskit_dense::DenseError),
}

/// Result type for clustering operations
pub type Result<T> = std::result::Result<T, ClusteringError>;
