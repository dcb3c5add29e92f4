//! Partition error types.

use thiserror::Error;

/// Errors that can occur while partitioning or exporting.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// k outside [1, N]
    #[error("Invalid cluster count: k = {k} but there are {n} items (need 1 <= k <= N)")]
    InvalidClusterCount { k: usize, n: usize },

    /// Vectors disagree on dimension
    #[error("Dimension mismatch at item {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Assignment and corpus lengths differ
    #[error("Assignment covers {assignments} items but corpus has {items}")]
    LengthMismatch { assignments: usize, items: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
