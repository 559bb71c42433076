//! Error types for sim-matrix.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// A pivot was numerically zero within tolerance. Indices are external.
    #[error("singular matrix: zero pivot at row {row}, column {col}")]
    Singular { row: usize, col: usize },

    /// Duplicate coordinate, or a stamp into an undeclared coordinate after
    /// the pattern was compiled.
    #[error("pattern violation at ({row}, {col})")]
    PatternViolation { row: usize, col: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index {index} out of range for matrix of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    /// Solve or determinant requested without a usable factorization
    /// (never factored, last factorization failed, or real/complex mode mismatch).
    #[error("matrix has not been factored")]
    NotFactored,
}

pub type Result<T> = std::result::Result<T, MatrixError>;

/// Successful outcome of reorder/factorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorStatus {
    Factored,
    /// Dimension zero: trivially solved, not an error.
    EmptyMatrix,
}

impl FactorStatus {
    pub fn is_empty(self) -> bool {
        matches!(self, FactorStatus::EmptyMatrix)
    }
}
