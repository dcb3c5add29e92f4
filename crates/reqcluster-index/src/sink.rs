//! Vector sink trait and the disabled variant.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use reqcluster_types::Vector;

use crate::error::IndexError;

/// Destination for `(id, vector)` pairs.
///
/// Selected once at start-up; callers never check for a missing index.
#[async_trait]
pub trait VectorSink: Send + Sync {
    /// Human-readable sink name for logs
    fn name(&self) -> &str;

    /// Whether upserts reach a real index
    fn is_enabled(&self) -> bool {
        true
    }

    /// Vector dimension the index accepts, when known
    fn dimension(&self) -> Option<usize> {
        None
    }

    /// Insert or replace one vector.
    async fn upsert(&self, id: &str, vector: &[f32]) -> Result<(), IndexError>;
}

/// Sink used when no index is configured. Accepts and drops everything.
#[derive(Debug, Clone)]
pub struct DisabledSink {
    reason: String,
}

impl DisabledSink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl VectorSink for DisabledSink {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn upsert(&self, _id: &str, _vector: &[f32]) -> Result<(), IndexError> {
        Ok(())
    }
}

/// Id of the vector at corpus position `index`.
pub fn vector_id(prefix: &str, index: usize) -> String {
    format!("{}-{}", prefix, index)
}

/// Upsert every vector in corpus order, stopping at the first failure.
/// Returns the number of vectors written.
pub async fn sync_vectors(
    sink: &dyn VectorSink,
    id_prefix: &str,
    vectors: &[Vector],
) -> Result<usize, IndexError> {
    if !sink.is_enabled() {
        debug!(sink = sink.name(), "Index sync skipped");
        return Ok(0);
    }

    if let Some(expected) = sink.dimension() {
        if let Some(vector) = vectors.iter().find(|v| v.len() != expected) {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
    }

    info!(sink = sink.name(), count = vectors.len(), "Upserting embeddings");
    for (i, vector) in vectors.iter().enumerate() {
        sink.upsert(&vector_id(id_prefix, i), vector).await?;
    }
    info!(sink = sink.name(), count = vectors.len(), "Embeddings upserted");
    Ok(vectors.len())
}

/// Like [`sync_vectors`], but a failure is logged and swallowed.
pub async fn sync_best_effort(sink: &dyn VectorSink, id_prefix: &str, vectors: &[Vector]) -> usize {
    match sync_vectors(sink, id_prefix, vectors).await {
        Ok(count) => count,
        Err(e) => {
            warn!(sink = sink.name(), error = %e, "Index sync failed, continuing");
            0
        }
    }
}
