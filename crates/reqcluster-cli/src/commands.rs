//! Command implementations.
//!
//! Each command loads settings, applies CLI overrides, initializes logging
//! and drives the [`Pipeline`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use reqcluster_types::Settings;

use crate::cli::{InputArgs, PartitionArgs, RunArgs};
use crate::pipeline::{Pipeline, PipelineReport, Stages};

const RULE: &str = "============================================================";

/// Load layered settings and apply the global CLI flags.
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    settings.resolve_api_keys();
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over settings.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

pub fn apply_input_args(settings: &mut Settings, input: &InputArgs) {
    if let Some(corpus) = &input.corpus {
        settings.corpus_path = Some(corpus.clone());
    }
    if let Some(cache_path) = &input.cache_path {
        settings.output.cache_path = cache_path.clone();
    }
    if input.offline {
        settings.embedding.provider = "mock".to_string();
    }
}

pub fn apply_partition_args(settings: &mut Settings, partition: &PartitionArgs) {
    if let Some(k) = partition.clusters {
        settings.num_clusters = k;
    }
    if let Some(seed) = partition.seed {
        settings.seed = seed;
    }
}

/// Apply every `run` flag. `--no-index` also skips connecting to the index.
pub fn apply_run_args(settings: &mut Settings, args: &RunArgs) {
    apply_input_args(settings, &args.input);
    apply_partition_args(settings, &args.partition);
    if let Some(path) = &args.clusters_path {
        settings.output.clusters_path = path.clone();
    }
    if let Some(path) = &args.plot_path {
        settings.output.plot_path = path.clone();
    }
    if args.no_index {
        settings.index.enabled = false;
    }
}

/// Hints printed after a successful run.
pub fn next_steps(clusters_path: &Path) -> Vec<String> {
    vec![
        format!("1. Review {} - do clusters make sense?", clusters_path.display()),
        "2. Name each cluster (e.g., 'Order Management', 'Product Catalog')".to_string(),
        "3. Write ARCHITECTURE.md for each cluster".to_string(),
        "4. Define interfaces between clusters".to_string(),
    ]
}

/// `reqcluster run`
pub async fn run_pipeline(config: Option<&str>, log_level: Option<&str>, args: RunArgs) -> Result<()> {
    let mut settings = load_settings(config, log_level)?;
    apply_run_args(&mut settings, &args);
    init_logging(&settings)?;

    println!("{}", RULE);
    println!("  Requirement Clustering & Microservice Architecture");
    println!("{}", RULE);

    let stages = Stages {
        export: true,
        plot: !args.no_plot,
        index: settings.index.enabled,
    };

    let pipeline = Pipeline::from_settings(settings).await?;
    let corpus = pipeline.load_corpus()?;
    let report = pipeline
        .run(&corpus, stages)
        .await
        .context("Clustering run failed")?;

    print_summary(&report);

    println!();
    println!("{}", RULE);
    println!("Clustering complete!");
    println!("{}", RULE);
    println!();
    println!("Next steps:");
    for step in next_steps(&pipeline.settings().output.clusters_path) {
        println!("{}", step);
    }

    Ok(())
}

/// `reqcluster embed`
pub async fn embed_only(config: Option<&str>, log_level: Option<&str>, input: InputArgs) -> Result<()> {
    let mut settings = load_settings(config, log_level)?;
    apply_input_args(&mut settings, &input);
    settings.index.enabled = false;
    init_logging(&settings)?;

    let pipeline = Pipeline::from_settings(settings).await?;
    let corpus = pipeline.load_corpus()?;
    let vectors = pipeline
        .embed(&corpus)
        .await
        .context("Embedding failed")?;

    let dimension = vectors.first().map(Vec::len).unwrap_or(0);
    info!(count = vectors.len(), dimension, "Embeddings ready");
    println!(
        "Embedded {} requirements ({} dimensions) into {}",
        vectors.len(),
        dimension,
        pipeline.settings().output.cache_path.display()
    );
    Ok(())
}

/// `reqcluster export`
pub async fn export_only(
    config: Option<&str>,
    log_level: Option<&str>,
    input: InputArgs,
    partition: PartitionArgs,
    clusters_path: Option<PathBuf>,
) -> Result<()> {
    let mut settings = load_settings(config, log_level)?;
    apply_input_args(&mut settings, &input);
    apply_partition_args(&mut settings, &partition);
    if let Some(path) = clusters_path {
        settings.output.clusters_path = path;
    }
    settings.index.enabled = false;
    init_logging(&settings)?;

    let pipeline = Pipeline::from_settings(settings).await?;
    let corpus = pipeline.load_corpus()?;
    let report = pipeline
        .run(&corpus, Stages::EXPORT_ONLY)
        .await
        .context("Clustering run failed")?;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &PipelineReport) {
    println!();
    println!("Clustered {} requirements:", report.items);
    for (cluster, size) in report.partition.sizes().iter().enumerate() {
        println!("  Cluster {}: {} requirements", cluster, size);
    }
    if let Some(path) = &report.clusters_path {
        println!("Clusters saved to {}", path.display());
    }
    if let Some(path) = &report.plot_path {
        println!("Visualization saved to {}", path.display());
    }
    if report.upserted > 0 {
        println!("Upserted {} embeddings to the vector index", report.upserted);
    }
}
