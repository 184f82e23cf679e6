//! Error types for hsskit-dense

use thiserror::Error;

/// Errors that can occur in dense matrix operations
#[derive(Debug, Error)]
pub enum DenseError {
    /// Dimension mismatch between operands
    #[error("Dimension mismatch in {op}: ({lhs_rows}, {lhs_cols}) vs ({rhs_rows}, {rhs_cols})")]
    DimensionMismatch {
        op: &'static str,
        lhs_rows: usize,
        lhs_cols: usize,
        rhs_rows: usize,
        rhs_cols: usize,
    },

    /// A square matrix was required
    #[error("Matrix must be square, got ({nrows}, {ncols})")]
    NotSquare { nrows: usize, ncols: usize },

    /// Row-major buffer has the wrong length
    #[error("Buffer length {actual} does not match matrix size {expected}")]
    BufferLength { expected: usize, actual: usize },
}

/// Result type for dense operations
pub type Result<T> = std::result::Result<T, DenseError>;
