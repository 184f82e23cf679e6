//! Error types for hsskit-hss

use thiserror::Error;

/// Errors that can occur in HSS construction, compression and factorization
#[derive(Debug, Error)]
pub enum HSSError {
    /// Operation needs a compressed matrix
    #[error("HSS matrix has not been compressed")]
    NotCompressed,

    /// Operation needs a square matrix
    #[error("HSS matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// Unrecognized compression algorithm name
    #[error("Compression algorithm '{name}' not recognized")]
    UnknownCompressionAlgorithm { name: String },

    /// Operand shape does not match the matrix
    #[error("Dimension mismatch in {op}: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    DimensionMismatch {
        op: &'static str,
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    /// Row or column index outside the matrix
    #[error("Index {index} out of range for dimension {size}")]
    IndexOutOfRange { index: usize, size: usize },

    /// Partition tree does not fit the operand
    #[error("Invalid partition tree: {message}")]
    InvalidTree { message: String },

    /// Dense kernel error
    #[error("Dense error: {0}")]
    Dense(#[from] hsskit_dense::DenseError),

    /// Clustering or neighbor search error
    #[error("Clustering error: {0}")]
    Clustering(#[from] hsskit_clustering::ClusteringError),
}

/// Result type for HSS operations
pub type Result<T> = std::result::Result<T, HSSError>;
