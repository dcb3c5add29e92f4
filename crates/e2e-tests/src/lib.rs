//! End-to-end test infrastructure for reqcluster.
//!
//! Provides a shared TestHarness and helpers for scenario tests covering the
//! full corpus-to-artifacts pipeline.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use reqcluster_cli::Pipeline;
use reqcluster_embeddings::MockEmbedder;
use reqcluster_index::{DisabledSink, VectorSink};
use reqcluster_types::{Corpus, Settings, Vector};

/// Six short requirements from two obvious domains.
pub const SIX_REQUIREMENTS: [&str; 6] = [
    "Customers can place an order",
    "Products have a name and a price",
    "Customers can cancel an order before shipping",
    "Products can be searched by category",
    "Order history is visible to customers",
    "Product images are shown in the catalog",
];

/// Shared test harness: a temp directory with the artifact paths laid out
/// the way the binary lays them out.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub cache_path: PathBuf,
    pub clusters_path: PathBuf,
    pub plot_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let output = temp_dir.path().join("output");

        Self {
            cache_path: output.join("embeddings.txt"),
            clusters_path: output.join("clusters.json"),
            plot_path: output.join("clusters.png"),
            _temp_dir: temp_dir,
        }
    }

    /// Settings pointing at this harness, offline, index disabled.
    pub fn settings(&self, k: usize) -> Settings {
        let mut settings = Settings {
            num_clusters: k,
            ..Default::default()
        };
        settings.output.cache_path = self.cache_path.clone();
        settings.output.clusters_path = self.clusters_path.clone();
        settings.output.plot_path = self.plot_path.clone();
        settings.embedding.provider = "mock".to_string();
        settings.index.enabled = false;
        settings.projection.iterations = 300;
        settings
    }

    /// Pipeline with a counting mock embedder and no index.
    pub fn pipeline(&self, k: usize, embedder: Arc<MockEmbedder>) -> Pipeline {
        self.pipeline_with_sink(k, embedder, Arc::new(DisabledSink::new("e2e")))
    }

    pub fn pipeline_with_sink(
        &self,
        k: usize,
        embedder: Arc<MockEmbedder>,
        sink: Arc<dyn VectorSink>,
    ) -> Pipeline {
        Pipeline::new(self.settings(k), embedder, sink)
    }

    /// Write `vectors` to the cache path, one JSON array per line.
    pub fn write_cache(&self, vectors: &[Vector]) {
        let parent = self.cache_path.parent().expect("cache path has a parent");
        fs::create_dir_all(parent).expect("Failed to create output dir");

        let mut content = String::new();
        for vector in vectors {
            content.push_str(&serde_json::to_string(vector).expect("Failed to encode vector"));
            content.push('\n');
        }
        fs::write(&self.cache_path, content).expect("Failed to write cache");
    }

    /// Read and parse the JSON export.
    pub fn read_export(&self) -> serde_json::Value {
        let json = fs::read_to_string(&self.clusters_path).expect("Failed to read export");
        serde_json::from_str(&json).expect("Export is not valid JSON")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Corpus built from string literals.
pub fn corpus_of(items: &[&str]) -> Corpus {
    Corpus::new(items.iter().map(|s| s.to_string()).collect()).expect("Corpus must not be empty")
}

/// Six distinct vectors: items 0, 2, 4 near one corner and 1, 3, 5 near the
/// opposite one.
pub fn two_group_vectors() -> Vec<Vector> {
    (0..6)
        .map(|i| {
            let base = if i % 2 == 0 { 0.0 } else { 1.0 };
            vec![base + 0.01 * i as f32, base - 0.01 * i as f32, base]
        })
        .collect()
}

/// `n` vectors spread along a line, all distinct.
pub fn line_vectors(n: usize) -> Vec<Vector> {
    (0..n).map(|i| vec![i as f32, (i * i) as f32 * 0.1]).collect()
}
