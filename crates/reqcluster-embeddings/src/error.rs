//! Embedding error types.

use thiserror::Error;

/// Errors that can occur while acquiring or caching embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Missing credential or invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding service request failed
    #[error("Embedding service error: {0}")]
    Service(String),

    /// Embedding service rejected the request with HTTP 429
    #[error("Embedding service rate limit exceeded")]
    RateLimitExceeded,

    /// Embedding service returned something unusable
    #[error("Failed to parse embedding response: {0}")]
    Parse(String),

    /// Cache line could not be parsed as a numeric array
    #[error("Malformed cache at line {line}: {reason}")]
    CacheFormat { line: usize, reason: String },

    /// Cache has a different number of vectors than the corpus has items
    #[error("Cache holds {actual} vectors but corpus has {expected} items")]
    CacheLength { expected: usize, actual: usize },

    /// Vectors disagree on dimension
    #[error("Dimension mismatch at item {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmbeddingError {
    /// True for errors that mean the cache artifact cannot be trusted.
    pub fn is_cache_format(&self) -> bool {
        matches!(
            self,
            EmbeddingError::CacheFormat { .. } | EmbeddingError::CacheLength { .. }
        )
    }

    /// True for errors that came from the embedding service.
    pub fn is_service(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Service(_) | EmbeddingError::RateLimitExceeded | EmbeddingError::Parse(_)
        )
    }
}
