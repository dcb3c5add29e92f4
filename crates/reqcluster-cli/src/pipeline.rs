//! Pipeline orchestration.
//!
//! Acquisition, then partitioning, then export, plot and index sync. The
//! last three only read the vectors and the assignment, so the plot and the
//! index sync run concurrently.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use reqcluster_embeddings::{build_service, EmbeddingAcquirer, EmbeddingError, EmbeddingService, VectorCache};
use reqcluster_index::{build_sink, sync_best_effort, VectorSink};
use reqcluster_partition::{ClusterAssignment, KMeans, KMeansConfig, Partition, PartitionError};
use reqcluster_types::{CoreError, Corpus, Settings, Vector};
use reqcluster_viz::{visualize, VizError};

/// Any failure that aborts a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Viz(#[from] VizError),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Stages run after partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    pub export: bool,
    pub plot: bool,
    pub index: bool,
}

impl Stages {
    pub const ALL: Stages = Stages {
        export: true,
        plot: true,
        index: true,
    };

    pub const EXPORT_ONLY: Stages = Stages {
        export: true,
        plot: false,
        index: false,
    };
}

/// Outcome of a run.
#[derive(Debug)]
pub struct PipelineReport {
    pub items: usize,
    pub partition: Partition,
    pub clusters_path: Option<PathBuf>,
    pub plot_path: Option<PathBuf>,
    pub upserted: usize,
}

/// The clustering pipeline with its collaborators chosen up front.
pub struct Pipeline {
    settings: Settings,
    service: Arc<dyn EmbeddingService>,
    sink: Arc<dyn VectorSink>,
}

impl Pipeline {
    pub fn new(settings: Settings, service: Arc<dyn EmbeddingService>, sink: Arc<dyn VectorSink>) -> Self {
        Self {
            settings,
            service,
            sink,
        }
    }

    /// Validate settings and build the embedding service and index sink.
    ///
    /// A new index is sized to the embedding model when its dimension is
    /// known up front.
    pub async fn from_settings(mut settings: Settings) -> Result<Self, PipelineError> {
        settings.validate()?;
        let service = build_service(&settings.embedding)?;
        if let Some(dimension) = service.info().dimension {
            if dimension != settings.index.dimension {
                debug!(
                    configured = settings.index.dimension,
                    model = dimension,
                    "Using model dimension for the index"
                );
                settings.index.dimension = dimension;
            }
        }
        let sink = build_sink(&settings.index).await;
        Ok(Self::new(settings, service, sink))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The configured corpus, or the built-in sample.
    pub fn load_corpus(&self) -> Result<Corpus, PipelineError> {
        let corpus = match &self.settings.corpus_path {
            Some(path) => Corpus::from_path(path)?,
            None => Corpus::sample()?,
        };
        info!(count = corpus.len(), "Loaded requirements");
        Ok(corpus)
    }

    /// One vector per corpus item, from the cache or the service.
    pub async fn embed(&self, corpus: &Corpus) -> Result<Vec<Vector>, PipelineError> {
        let acquirer = EmbeddingAcquirer::new(
            VectorCache::new(&self.settings.output.cache_path),
            self.service.clone(),
        )
        .with_concurrency(self.settings.embedding.concurrency);

        Ok(acquirer.acquire(corpus).await?)
    }

    /// Seeded K-Means over the vectors, logging a size preview.
    pub fn partition(&self, vectors: &[Vector]) -> Result<ClusterAssignment, PipelineError> {
        let k = self.settings.num_clusters;
        info!(items = vectors.len(), k, "Clustering requirements");

        let result = KMeans::new(KMeansConfig::from(&self.settings.partition)).fit(
            vectors,
            k,
            self.settings.seed,
        )?;

        info!(inertia = result.inertia, restart = result.restart, "Cluster preview");
        for (cluster, size) in result.assignment.sizes().iter().enumerate() {
            info!("  Cluster {}: {} requirements", cluster, size);
        }

        Ok(result.assignment)
    }

    /// Run every stage for `corpus`.
    ///
    /// The export is written before plotting, so a plot failure leaves it in
    /// place. Index sync failures are logged and never fail the run.
    pub async fn run(&self, corpus: &Corpus, stages: Stages) -> Result<PipelineReport, PipelineError> {
        let k = self.settings.num_clusters;
        if k == 0 || k > corpus.len() {
            return Err(PartitionError::InvalidClusterCount { k, n: corpus.len() }.into());
        }

        let vectors = self.embed(corpus).await?;
        let assignment = self.partition(&vectors)?;
        let partition = Partition::from_assignment(&assignment, corpus)?;

        let clusters_path = if stages.export {
            let path = self.settings.output.clusters_path.clone();
            partition.write_json(&path)?;
            Some(path)
        } else {
            None
        };

        let vectors = Arc::new(vectors);
        let (plot_path, upserted) = tokio::join!(
            self.plot(vectors.clone(), assignment, stages.plot),
            self.sync(&vectors, stages.index),
        );

        Ok(PipelineReport {
            items: corpus.len(),
            partition,
            clusters_path,
            plot_path: plot_path?,
            upserted,
        })
    }

    async fn plot(
        &self,
        vectors: Arc<Vec<Vector>>,
        assignment: ClusterAssignment,
        enabled: bool,
    ) -> Result<Option<PathBuf>, PipelineError> {
        if !enabled {
            return Ok(None);
        }

        let path = self.settings.output.plot_path.clone();
        let target = path.clone();
        let projection = self.settings.projection.clone();
        let seed = self.settings.seed;

        // Projection is CPU-bound.
        tokio::task::spawn_blocking(move || {
            visualize(&vectors, &assignment, &projection, seed, &target)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        Ok(Some(path))
    }

    async fn sync(&self, vectors: &[Vector], enabled: bool) -> usize {
        if !enabled {
            return 0;
        }
        sync_best_effort(self.sink.as_ref(), &self.settings.index.id_prefix, vectors).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqcluster_embeddings::MockEmbedder;
    use reqcluster_index::DisabledSink;
    use tempfile::TempDir;

    fn settings(temp: &TempDir, k: usize) -> Settings {
        let mut settings = Settings {
            num_clusters: k,
            ..Default::default()
        };
        settings.output.cache_path = temp.path().join("embeddings.txt");
        settings.output.clusters_path = temp.path().join("clusters.json");
        settings.output.plot_path = temp.path().join("clusters.png");
        settings.projection.iterations = 250;
        settings
    }

    fn pipeline(settings: Settings, service: Arc<MockEmbedder>) -> Pipeline {
        Pipeline::new(settings, service, Arc::new(DisabledSink::new("test")))
    }

    fn corpus() -> Corpus {
        Corpus::new(
            [
                "Orders can be placed by customers",
                "Orders can be cancelled before shipping",
                "Products have a name and a price",
                "Products can be searched by name",
                "Customers can reset their password",
                "Customers can update their email",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_export_only_run() {
        let temp = TempDir::new().unwrap();
        let service = Arc::new(MockEmbedder::new(32));
        let pipeline = pipeline(settings(&temp, 3), service.clone());

        let report = pipeline.run(&corpus(), Stages::EXPORT_ONLY).await.unwrap();

        assert_eq!(report.items, 6);
        assert_eq!(report.partition.total(), 6);
        assert_eq!(report.partition.k(), 3);
        assert!(temp.path().join("clusters.json").exists());
        assert!(temp.path().join("embeddings.txt").exists());
        assert!(report.plot_path.is_none());
        assert_eq!(service.calls(), 6);
    }

    #[tokio::test]
    async fn test_second_run_uses_cache() {
        let temp = TempDir::new().unwrap();
        let service = Arc::new(MockEmbedder::new(32));
        let pipeline = pipeline(settings(&temp, 2), service.clone());

        let first = pipeline.run(&corpus(), Stages::EXPORT_ONLY).await.unwrap();
        let second = pipeline.run(&corpus(), Stages::EXPORT_ONLY).await.unwrap();

        assert_eq!(service.calls(), 6);
        assert_eq!(first.partition, second.partition);
    }

    #[tokio::test]
    async fn test_full_run_writes_plot() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(settings(&temp, 2), Arc::new(MockEmbedder::new(32)));

        let report = pipeline.run(&corpus(), Stages::ALL).await.unwrap();
        assert_eq!(report.plot_path, Some(temp.path().join("clusters.png")));
        assert!(temp.path().join("clusters.png").exists());
        assert_eq!(report.upserted, 0);
    }

    #[tokio::test]
    async fn test_invalid_cluster_count() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(settings(&temp, 7), Arc::new(MockEmbedder::new(32)));

        let result = pipeline.run(&corpus(), Stages::EXPORT_ONLY).await;
        assert!(matches!(
            result,
            Err(PipelineError::Partition(PartitionError::InvalidClusterCount { k: 7, n: 6 }))
        ));
        assert!(!temp.path().join("clusters.json").exists());
    }

    #[tokio::test]
    async fn test_palette_failure_keeps_export() {
        let temp = TempDir::new().unwrap();
        let items: Vec<String> = (0..14).map(|i| format!("Requirement number {}", i)).collect();
        let corpus = Corpus::new(items).unwrap();
        let pipeline = pipeline(settings(&temp, 13), Arc::new(MockEmbedder::new(32)));

        let result = pipeline.run(&corpus, Stages::ALL).await;
        assert!(matches!(
            result,
            Err(PipelineError::Viz(VizError::InsufficientPalette { .. }))
        ));
        assert!(temp.path().join("clusters.json").exists());
        assert!(!temp.path().join("clusters.png").exists());
    }

    #[tokio::test]
    async fn test_from_settings_sizes_index_to_model() {
        let temp = TempDir::new().unwrap();
        let mut settings = settings(&temp, 2);
        settings.embedding.provider = "mock".to_string();
        settings.index.enabled = false;
        assert_eq!(settings.index.dimension, 1536);

        let pipeline = Pipeline::from_settings(settings).await.unwrap();
        assert_eq!(pipeline.settings().index.dimension, reqcluster_embeddings::MOCK_DIMENSION);
    }

    #[tokio::test]
    async fn test_zero_clusters_is_invalid_cluster_count() {
        let temp = TempDir::new().unwrap();
        let service = Arc::new(MockEmbedder::new(32));
        let pipeline = pipeline(settings(&temp, 0), service.clone());

        let result = pipeline.run(&corpus(), Stages::EXPORT_ONLY).await;
        assert!(matches!(
            result,
            Err(PipelineError::Partition(PartitionError::InvalidClusterCount { k: 0, n: 6 }))
        ));
        assert_eq!(service.calls(), 0);
        assert!(!temp.path().join("embeddings.txt").exists());
    }

    #[tokio::test]
    async fn test_too_many_clusters_rejected_before_embedding() {
        let temp = TempDir::new().unwrap();
        let service = Arc::new(MockEmbedder::new(32));
        let pipeline = pipeline(settings(&temp, 7), service.clone());

        assert!(pipeline.run(&corpus(), Stages::EXPORT_ONLY).await.is_err());
        assert_eq!(service.calls(), 0);
    }
}
