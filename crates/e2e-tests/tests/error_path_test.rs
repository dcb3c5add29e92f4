//! Error path E2E tests for reqcluster.
//!
//! Every fatal condition aborts the run; nothing is written that a later
//! run could mistake for a complete result.

use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use e2e_tests::{corpus_of, line_vectors, two_group_vectors, TestHarness, SIX_REQUIREMENTS};
use reqcluster_cli::{Pipeline, PipelineError, Stages};
use reqcluster_embeddings::{EmbeddingError, MockEmbedder};
use reqcluster_partition::PartitionError;
use reqcluster_viz::VizError;

/// Empty cache file with a six-item corpus: length mismatch, no service call.
#[tokio::test]
async fn test_empty_cache_file_is_fatal() {
    let harness = TestHarness::new();
    harness.write_cache(&[]);
    let embedder = Arc::new(MockEmbedder::new(3));

    let result = harness
        .pipeline(2, embedder.clone())
        .run(&corpus_of(&SIX_REQUIREMENTS), Stages::ALL)
        .await;

    match result {
        Err(PipelineError::Embedding(e)) => {
            assert!(e.is_cache_format());
            assert!(matches!(
                e,
                EmbeddingError::CacheLength {
                    expected: 6,
                    actual: 0
                }
            ));
        }
        other => panic!("Expected cache error, got {:?}", other.map(|r| r.items)),
    }
    assert_eq!(embedder.calls(), 0);
    assert!(!harness.clusters_path.exists());

    // The cache is left untouched.
    assert_eq!(fs::read_to_string(&harness.cache_path).unwrap(), "");
}

/// A cache line that is not a numeric array is reported with its line number.
#[tokio::test]
async fn test_malformed_cache_line() {
    let harness = TestHarness::new();
    harness.write_cache(&two_group_vectors());
    let content = fs::read_to_string(&harness.cache_path).unwrap();
    let corrupted = content.replacen("\n", "\nnot json\n", 1);
    fs::write(&harness.cache_path, corrupted).unwrap();
    let embedder = Arc::new(MockEmbedder::new(3));

    let result = harness
        .pipeline(2, embedder.clone())
        .run(&corpus_of(&SIX_REQUIREMENTS), Stages::EXPORT_ONLY)
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::Embedding(EmbeddingError::CacheFormat { line: 2, .. }))
    ));
    assert_eq!(embedder.calls(), 0);
}

/// A failing embedding call aborts acquisition and persists no cache.
#[tokio::test]
async fn test_service_failure_persists_nothing() {
    let harness = TestHarness::new();
    let embedder = Arc::new(MockEmbedder::new(8).failing_on_call(4));

    let result = harness
        .pipeline(2, embedder.clone())
        .run(&corpus_of(&SIX_REQUIREMENTS), Stages::ALL)
        .await;

    match result {
        Err(PipelineError::Embedding(e)) => assert!(e.is_service()),
        other => panic!("Expected service error, got {:?}", other.map(|r| r.items)),
    }
    assert!(!harness.cache_path.exists());
    assert!(!harness.clusters_path.exists());
}

/// k above N fails before anything is exported.
#[tokio::test]
async fn test_too_many_clusters() {
    let harness = TestHarness::new();
    harness.write_cache(&two_group_vectors());

    let result = harness
        .pipeline(7, Arc::new(MockEmbedder::new(3)))
        .run(&corpus_of(&SIX_REQUIREMENTS), Stages::ALL)
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::Partition(PartitionError::InvalidClusterCount { k: 7, n: 6 }))
    ));
    assert!(!harness.clusters_path.exists());
}

/// More clusters than palette colors fails at render time only; the export
/// already written stays.
#[tokio::test]
async fn test_palette_exhausted() {
    let harness = TestHarness::new();
    let items: Vec<String> = (0..13).map(|i| format!("Requirement {}", i)).collect();
    let refs: Vec<&str> = items.iter().map(String::as_str).collect();
    harness.write_cache(&line_vectors(13));

    let result = harness
        .pipeline(13, Arc::new(MockEmbedder::new(2)))
        .run(&corpus_of(&refs), Stages::ALL)
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::Viz(VizError::InsufficientPalette {
            groups: 13,
            palette: 12
        }))
    ));
    assert!(harness.clusters_path.exists());
    assert!(!harness.plot_path.exists());

    let export = harness.read_export();
    assert_eq!(export.as_object().unwrap().len(), 13);
}

/// Twelve clusters, the palette size, render fine.
#[tokio::test]
async fn test_palette_exactly_covers() {
    let harness = TestHarness::new();
    let items: Vec<String> = (0..12).map(|i| format!("Requirement {}", i)).collect();
    let refs: Vec<&str> = items.iter().map(String::as_str).collect();
    harness.write_cache(&line_vectors(12));

    let report = harness
        .pipeline(12, Arc::new(MockEmbedder::new(2)))
        .run(&corpus_of(&refs), Stages::ALL)
        .await
        .unwrap();

    assert_eq!(report.partition.sizes(), vec![1; 12]);
    assert!(harness.plot_path.exists());
}

/// A missing OpenAI key aborts at startup, even when the cache could serve
/// every item.
#[tokio::test]
async fn test_missing_openai_key_fails_before_any_work() {
    let harness = TestHarness::new();
    harness.write_cache(&two_group_vectors());
    let cached = fs::read_to_string(&harness.cache_path).unwrap();

    let mut settings = harness.settings(2);
    settings.embedding.provider = "openai".to_string();
    settings.embedding.api_key = None;

    match Pipeline::from_settings(settings).await {
        Err(PipelineError::Embedding(EmbeddingError::Config(msg))) => {
            assert!(msg.contains("OPENAI_API_KEY"));
        }
        Err(other) => panic!("Expected configuration error, got {:?}", other),
        Ok(_) => panic!("Expected configuration error, got a pipeline"),
    }

    assert!(!harness.clusters_path.exists());
    assert!(!harness.plot_path.exists());
    assert_eq!(fs::read_to_string(&harness.cache_path).unwrap(), cached);
}
