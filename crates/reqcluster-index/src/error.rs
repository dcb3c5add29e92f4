//! Index sync error types.

use thiserror::Error;

/// Errors from the external vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request failed or returned an error status
    #[error("Index service error: {0}")]
    Service(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Vectors do not fit the index
    #[error("Index expects dimension {expected}, vectors have {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Unexpected response body
    #[error("Parse error: {0}")]
    Parse(String),
}
