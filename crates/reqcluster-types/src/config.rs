//! Configuration loading for reqcluster.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! Settings are built once at the entry point and passed down explicitly;
//! no component looks configuration up on its own.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CoreError;

/// Environment variable consulted when `embedding.api_key` is unset.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable consulted when `index.api_key` is unset.
pub const PINECONE_API_KEY_ENV: &str = "PINECONE_API_KEY";

/// Output artifact locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Positional embedding cache (one JSON array per line)
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Partition export (JSON object keyed by "Cluster {i}")
    #[serde(default = "default_clusters_path")]
    pub clusters_path: PathBuf,

    /// Scatter plot image
    #[serde(default = "default_plot_path")]
    pub plot_path: PathBuf,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("output/embeddings.txt")
}

fn default_clusters_path() -> PathBuf {
    PathBuf::from("output/clusters.json")
}

fn default_plot_path() -> PathBuf {
    PathBuf::from("output/clusters.png")
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            clusters_path: default_clusters_path(),
            plot_path: default_plot_path(),
        }
    }
}

/// K-Means tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionSettings {
    /// Number of seeded restarts; the lowest-inertia restart wins
    #[serde(default = "default_n_init")]
    pub n_init: usize,

    /// Iteration cap per restart
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Total squared centroid shift below which a restart has converged
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_n_init() -> usize {
    10
}

fn default_max_iterations() -> usize {
    300
}

fn default_tolerance() -> f64 {
    1e-4
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            n_init: default_n_init(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// t-SNE projection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionSettings {
    /// Target perplexity, capped at N-1 for small corpora
    #[serde(default = "default_perplexity")]
    pub perplexity: f64,

    /// Gradient descent iterations
    #[serde(default = "default_projection_iterations")]
    pub iterations: usize,
}

fn default_perplexity() -> f64 {
    30.0
}

fn default_projection_iterations() -> usize {
    1000
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            perplexity: default_perplexity(),
            iterations: default_projection_iterations(),
        }
    }
}

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Provider name ("openai" or "mock")
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model name (e.g., "text-embedding-ada-002")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// API key (falls back to OPENAI_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    #[serde(default = "default_embedding_base_url")]
    pub api_base_url: String,

    /// Maximum in-flight embedding requests (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum attempts per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            api_key: None,
            api_base_url: default_embedding_base_url(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// External vector index (Pinecone) configuration.
///
/// The index is optional: without an API key the sync step is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Master switch; a key is still required to actually sync
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API key (falls back to PINECONE_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Control plane URL
    #[serde(default = "default_index_control_url")]
    pub control_url: String,

    /// Index name, created on first use
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Vector dimension used when creating the index
    #[serde(default = "default_index_dimension")]
    pub dimension: usize,

    /// Distance metric used when creating the index
    #[serde(default = "default_index_metric")]
    pub metric: String,

    /// Serverless cloud
    #[serde(default = "default_index_cloud")]
    pub cloud: String,

    /// Serverless region
    #[serde(default = "default_index_region")]
    pub region: String,

    /// Prefix of generated vector ids ("{prefix}-{i}")
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_index_control_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_index_name() -> String {
    "earlybird-requirements".to_string()
}

fn default_index_dimension() -> usize {
    1536
}

fn default_index_metric() -> String {
    "cosine".to_string()
}

fn default_index_cloud() -> String {
    "aws".to_string()
}

fn default_index_region() -> String {
    "us-east-1".to_string()
}

fn default_id_prefix() -> String {
    "requirement".to_string()
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            api_key: None,
            control_url: default_index_control_url(),
            index_name: default_index_name(),
            dimension: default_index_dimension(),
            metric: default_index_metric(),
            cloud: default_index_cloud(),
            region: default_index_region(),
            id_prefix: default_id_prefix(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Number of clusters (k)
    #[serde(default = "default_num_clusters")]
    pub num_clusters: usize,

    /// Seed threaded through partitioning and projection
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional corpus file; the built-in sample is used when absent
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,

    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub partition: PartitionSettings,

    #[serde(default)]
    pub projection: ProjectionSettings,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub index: IndexSettings,
}

fn default_num_clusters() -> usize {
    12
}

fn default_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            num_clusters: default_num_clusters(),
            seed: default_seed(),
            log_level: default_log_level(),
            corpus_path: None,
            output: OutputSettings::default(),
            partition: PartitionSettings::default(),
            projection: ProjectionSettings::default(),
            embedding: EmbeddingSettings::default(),
            index: IndexSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (<config dir>/reqcluster/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (REQCLUSTER_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, CoreError> {
        let config_dir = ProjectDirs::from("", "", "reqcluster")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("num_clusters", default_num_clusters() as i64)
            .map_err(|e| CoreError::Config(e.to_string()))?
            .set_default("seed", default_seed() as i64)
            .map_err(|e| CoreError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| CoreError::Config(e.to_string()))?
            .set_default("embedding.provider", default_embedding_provider())
            .map_err(|e| CoreError::Config(e.to_string()))?
            .set_default("embedding.model", default_embedding_model())
            .map_err(|e| CoreError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // REQCLUSTER_NUM_CLUSTERS, REQCLUSTER_EMBEDDING__MODEL, ...
        builder = builder.add_source(
            Environment::with_prefix("REQCLUSTER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Fill unset API keys from the conventional provider variables.
    pub fn resolve_api_keys(&mut self) {
        self.resolve_api_keys_with(|name| std::env::var(name).ok());
    }

    /// Same as [`Settings::resolve_api_keys`] with an injectable lookup.
    pub fn resolve_api_keys_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = lookup(OPENAI_API_KEY_ENV).filter(|k| !k.is_empty());
        }
        if self.index.api_key.is_none() {
            self.index.api_key = lookup(PINECONE_API_KEY_ENV).filter(|k| !k.is_empty());
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.partition.n_init == 0 {
            return Err(CoreError::Config("partition.n_init must be > 0".to_string()));
        }
        if self.partition.max_iterations == 0 {
            return Err(CoreError::Config(
                "partition.max_iterations must be > 0".to_string(),
            ));
        }
        if !(self.projection.perplexity > 0.0) {
            return Err(CoreError::Config(format!(
                "projection.perplexity must be > 0, got {}",
                self.projection.perplexity
            )));
        }
        if self.embedding.concurrency == 0 {
            return Err(CoreError::Config(
                "embedding.concurrency must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
