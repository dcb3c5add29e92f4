//! # reqcluster-embeddings
//!
//! Embedding acquisition for reqcluster.
//!
//! Turns corpus items into vectors through an external embedding service,
//! persisting them in a positional cache so re-runs never call the service
//! again.
//!
//! ## Features
//! - `VectorCache`: one JSON array per line, atomic overwrite
//! - `EmbeddingAcquirer`: cache short-circuit, ordered (optionally
//!   concurrent) embedding, all-or-nothing persistence
//! - `OpenAiEmbedder`: OpenAI-compatible client with exponential backoff
//! - `MockEmbedder`: deterministic offline embeddings

pub mod acquire;
pub mod cache;
pub mod error;
pub mod mock;
pub mod model;
pub mod openai;

use std::sync::Arc;

use reqcluster_types::EmbeddingSettings;

pub use acquire::{check_dimensions, EmbeddingAcquirer};
pub use cache::VectorCache;
pub use error::EmbeddingError;
pub use mock::MockEmbedder;
pub use model::{EmbeddingService, ModelInfo};
pub use openai::{OpenAiConfig, OpenAiEmbedder};

/// Dimension of vectors produced by the "mock" provider.
pub const MOCK_DIMENSION: usize = 64;

/// Build the embedding service named by the settings.
///
/// The "openai" provider requires a resolved API key; without one this
/// fails before any corpus or cache is touched.
pub fn build_service(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingService>, EmbeddingError> {
    match settings.provider.as_str() {
        "openai" => {
            let config = OpenAiConfig::from_settings(settings)?;
            Ok(Arc::new(OpenAiEmbedder::new(config)?))
        }
        "mock" => Ok(Arc::new(MockEmbedder::new(MOCK_DIMENSION))),
        other => Err(EmbeddingError::Config(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}
