//! Integration tests for the reqcluster pipeline.
//!
//! Drives `Pipeline::from_settings` the way the binary does, with the
//! offline embedder and the index disabled.

use std::fs;

use tempfile::TempDir;

use reqcluster_cli::{apply_run_args, InputArgs, PartitionArgs, Pipeline, RunArgs, Stages};
use reqcluster_types::Settings;

const REQUIREMENTS_MD: &str = "\
# Checkout requirements

- Orders can be placed by customers
- Orders can be cancelled before shipping
* Products have a name and a price
1. Products can be searched by name
2. Customers can reset their password

Customers can update their email
";

fn offline_settings(temp: &TempDir, k: usize) -> Settings {
    let corpus_path = temp.path().join("requirements.md");
    fs::write(&corpus_path, REQUIREMENTS_MD).unwrap();

    let mut settings = Settings::default();
    let args = RunArgs {
        input: InputArgs {
            corpus: Some(corpus_path),
            cache_path: Some(temp.path().join("out/embeddings.txt")),
            offline: true,
        },
        partition: PartitionArgs {
            clusters: Some(k),
            seed: Some(42),
        },
        clusters_path: Some(temp.path().join("out/clusters.json")),
        plot_path: Some(temp.path().join("out/clusters.png")),
        no_plot: false,
        no_index: true,
    };
    apply_run_args(&mut settings, &args);
    settings.projection.iterations = 250;
    settings
}

#[tokio::test]
async fn test_run_from_markdown_corpus() {
    let temp = TempDir::new().unwrap();
    let pipeline = Pipeline::from_settings(offline_settings(&temp, 3))
        .await
        .unwrap();

    let corpus = pipeline.load_corpus().unwrap();
    assert_eq!(corpus.len(), 6);
    assert_eq!(corpus.get(0), Some("Orders can be placed by customers"));

    let report = pipeline.run(&corpus, Stages::ALL).await.unwrap();
    assert_eq!(report.upserted, 0);

    let json = fs::read_to_string(temp.path().join("out/clusters.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 3);

    let total: usize = object
        .values()
        .map(|items| items.as_array().unwrap().len())
        .sum();
    assert_eq!(total, 6);
    assert!(temp.path().join("out/clusters.png").exists());

    let cache = fs::read_to_string(temp.path().join("out/embeddings.txt")).unwrap();
    assert_eq!(cache.lines().count(), 6);
}

#[tokio::test]
async fn test_runs_are_reproducible() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();

    let first = Pipeline::from_settings(offline_settings(&first_dir, 2))
        .await
        .unwrap();
    let second = Pipeline::from_settings(offline_settings(&second_dir, 2))
        .await
        .unwrap();

    let corpus = first.load_corpus().unwrap();
    let a = first.run(&corpus, Stages::EXPORT_ONLY).await.unwrap();
    let b = second.run(&corpus, Stages::EXPORT_ONLY).await.unwrap();
    assert_eq!(a.partition, b.partition);

    let a_json = fs::read_to_string(first_dir.path().join("out/clusters.json")).unwrap();
    let b_json = fs::read_to_string(second_dir.path().join("out/clusters.json")).unwrap();
    assert_eq!(a_json, b_json);
}

#[tokio::test]
async fn test_missing_corpus_file() {
    let temp = TempDir::new().unwrap();
    let mut settings = offline_settings(&temp, 2);
    settings.corpus_path = Some(temp.path().join("missing.md"));

    let pipeline = Pipeline::from_settings(settings).await.unwrap();
    assert!(pipeline.load_corpus().is_err());
}
