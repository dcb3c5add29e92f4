//! Embedding service trait and types.
//!
//! Defines the boundary to whatever turns text into vectors. The service is
//! fallible and may be rate limited; retries are the client's business.

use async_trait::async_trait;

use reqcluster_types::Vector;

use crate::error::EmbeddingError;

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name (e.g., "text-embedding-ada-002")
    pub name: String,
    /// Embedding dimension, when known ahead of the first call
    pub dimension: Option<usize>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, dimension: Option<usize>) -> Self {
        Self {
            name: name.into(),
            dimension,
        }
    }
}

/// Trait for embedding services.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Generate the embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vector, EmbeddingError>;
}
