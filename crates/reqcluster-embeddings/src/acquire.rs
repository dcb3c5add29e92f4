//! Embedding acquisition.
//!
//! Serves the whole corpus from the cache when one is present; otherwise
//! embeds every item, in corpus order, and persists the cache only after all
//! items succeeded.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use reqcluster_types::{Corpus, Vector};

use crate::cache::VectorCache;
use crate::error::EmbeddingError;
use crate::model::EmbeddingService;

/// Fills cache gaps by calling the embedding service.
pub struct EmbeddingAcquirer {
    cache: VectorCache,
    service: Arc<dyn EmbeddingService>,
    concurrency: usize,
}

impl EmbeddingAcquirer {
    pub fn new(cache: VectorCache, service: Arc<dyn EmbeddingService>) -> Self {
        Self {
            cache,
            service,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` requests in flight. Output order is
    /// unaffected.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cache(&self) -> &VectorCache {
        &self.cache
    }

    /// Return one vector per corpus item, in corpus order.
    ///
    /// A valid cache short-circuits the service entirely. A cache whose
    /// length differs from the corpus is an error, not a reason to
    /// re-embed.
    pub async fn acquire(&self, corpus: &Corpus) -> Result<Vec<Vector>, EmbeddingError> {
        let total = corpus.len();

        if let Some(vectors) = self.cache.load_aligned(total)? {
            info!(
                path = ?self.cache.path(),
                count = vectors.len(),
                "Embeddings file found, loading from cache"
            );
            return Ok(vectors);
        }

        info!(
            count = total,
            model = %self.service.info().name,
            concurrency = self.concurrency,
            "Generating embeddings"
        );

        let service = &self.service;
        let vectors: Vec<Vector> = stream::iter(corpus.iter().enumerate())
            .map(|(i, text)| async move {
                debug!(item = i + 1, total, "Embedding item");
                let vector = service.embed(text).await?;
                info!("[{}/{}] Embedded item", i + 1, total);
                Ok::<_, EmbeddingError>(vector)
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        check_dimensions(&vectors)?;

        self.cache.save(&vectors)?;
        Ok(vectors)
    }
}

/// Every vector must share the first vector's dimension.
pub fn check_dimensions(vectors: &[Vector]) -> Result<(), EmbeddingError> {
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    let expected = first.len();

    for (index, vector) in vectors.iter().enumerate() {
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                index,
                expected,
                actual: vector.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEmbedder;
    use crate::model::ModelInfo;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn corpus(items: &[&str]) -> Corpus {
        Corpus::new(items.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_acquire_embeds_and_saves() {
        let temp = TempDir::new().unwrap();
        let cache = VectorCache::new(temp.path().join("embeddings.txt"));
        let mock = Arc::new(MockEmbedder::new(8));
        let acquirer = EmbeddingAcquirer::new(cache.clone(), mock.clone());

        let items = corpus(&["first item", "second item", "third item"]);
        let vectors = acquirer.acquire(&items).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 8));
        assert_eq!(mock.calls(), 3);
        assert_eq!(cache.load().unwrap().unwrap(), vectors);
    }

    #[tokio::test]
    async fn test_acquire_uses_cache_without_calls() {
        let temp = TempDir::new().unwrap();
        let cache = VectorCache::new(temp.path().join("embeddings.txt"));
        let cached = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        cache.save(&cached).unwrap();

        let mock = Arc::new(MockEmbedder::new(2));
        let acquirer = EmbeddingAcquirer::new(cache, mock.clone());

        let vectors = acquirer.acquire(&corpus(&["a", "b"])).await.unwrap();
        assert_eq!(vectors, cached);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_acquire_cache_length_mismatch_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("embeddings.txt");
        std::fs::write(&path, "").unwrap();

        let mock = Arc::new(MockEmbedder::new(4));
        let acquirer = EmbeddingAcquirer::new(VectorCache::new(&path), mock.clone());

        let err = acquirer
            .acquire(&corpus(&["1", "2", "3", "4", "5", "6"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CacheLength {
                expected: 6,
                actual: 0
            }
        ));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_acquire_failure_persists_nothing() {
        let temp = TempDir::new().unwrap();
        let cache = VectorCache::new(temp.path().join("embeddings.txt"));
        let mock = Arc::new(MockEmbedder::new(4).failing_on_call(2));
        let acquirer = EmbeddingAcquirer::new(cache.clone(), mock);

        let err = acquirer
            .acquire(&corpus(&["one", "two", "three"]))
            .await
            .unwrap_err();
        assert!(err.is_service());
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn test_acquire_concurrent_preserves_order() {
        let temp = TempDir::new().unwrap();
        let sequential_cache = VectorCache::new(temp.path().join("seq.txt"));
        let concurrent_cache = VectorCache::new(temp.path().join("par.txt"));
        let items = corpus(&["alpha words", "beta words", "gamma words", "delta words"]);

        let sequential = EmbeddingAcquirer::new(sequential_cache, Arc::new(MockEmbedder::new(16)))
            .acquire(&items)
            .await
            .unwrap();
        let concurrent = EmbeddingAcquirer::new(concurrent_cache, Arc::new(MockEmbedder::new(16)))
            .with_concurrency(4)
            .acquire(&items)
            .await
            .unwrap();

        assert_eq!(sequential, concurrent);
    }

    struct RaggedService {
        info: ModelInfo,
    }

    #[async_trait]
    impl EmbeddingService for RaggedService {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn embed(&self, text: &str) -> Result<Vector, EmbeddingError> {
            Ok(vec![0.5; text.len()])
        }
    }

    #[tokio::test]
    async fn test_acquire_rejects_ragged_dimensions() {
        let temp = TempDir::new().unwrap();
        let cache = VectorCache::new(temp.path().join("embeddings.txt"));
        let service = Arc::new(RaggedService {
            info: ModelInfo::new("ragged", None),
        });
        let acquirer = EmbeddingAcquirer::new(cache.clone(), service);

        let err = acquirer.acquire(&corpus(&["ab", "abc"])).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                index: 1,
                expected: 2,
                actual: 3
            }
        ));
        assert!(!cache.exists());
    }
}
