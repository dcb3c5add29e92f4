//! Mock embedding service for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use reqcluster_types::Vector;

use crate::error::EmbeddingError;
use crate::model::{EmbeddingService, ModelInfo};

/// Mock embedder that derives deterministic vectors from text.
///
/// Texts sharing words end up with overlapping vectors, which is enough
/// structure for clustering to find something. Counts every call.
pub struct MockEmbedder {
    info: ModelInfo,
    dimension: usize,
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
}

impl MockEmbedder {
    /// Create a new mock embedder producing `dimension`-length vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            info: ModelInfo::new("mock-embedder", Some(dimension)),
            dimension: dimension.max(1),
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        }
    }

    /// Make the n-th call (1-based) fail with a service error.
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Number of `embed` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vector {
        let mut values = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let hash = fnv1a(&word.to_lowercase());
            let slot = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            values[slot] += sign;
        }

        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in values.iter_mut() {
                *v /= norm;
            }
        } else {
            values[0] = 1.0;
        }
        values
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl EmbeddingService for MockEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    async fn embed(&self, text: &str) -> Result<Vector, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(EmbeddingError::Service(format!(
                "mock failure on call {}",
                call
            )));
        }
        Ok(self.vector_for(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let embedder = MockEmbedder::new(16);
        let a = embedder.embed("Customers cancel orders").await.unwrap();
        let b = embedder.embed("Customers cancel orders").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_normalized() {
        let embedder = MockEmbedder::new(32);
        let v = embedder.embed("Packing clerks print labels").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_mock_no_words_still_nonzero() {
        let embedder = MockEmbedder::new(4);
        let v = embedder.embed("a b").await.unwrap();
        assert_eq!(v, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_mock_failure_on_call() {
        let embedder = MockEmbedder::new(8).failing_on_call(2);
        assert!(embedder.embed("first").await.is_ok());
        assert!(matches!(
            embedder.embed("second").await,
            Err(EmbeddingError::Service(_))
        ));
        assert!(embedder.embed("third").await.is_ok());
    }
}
