//! CLI argument parsing for reqcluster.
//!
//! Flags override every other configuration source.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Requirement clustering
///
/// Groups requirement statements by semantic similarity and renders a 2D
/// map of the grouping.
#[derive(Parser, Debug)]
#[command(name = "reqcluster")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default <config dir>/reqcluster/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Pipeline commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed, cluster, export, plot and sync to the vector index
    Run(RunArgs),

    /// Fill the embedding cache only
    Embed {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Embed, cluster and write the JSON export
    Export {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        partition: PartitionArgs,

        /// Override the export path
        #[arg(long)]
        clusters_path: Option<PathBuf>,
    },
}

/// Corpus and embedding options
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Corpus file (.json array or one item per line); built-in sample if omitted
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Override the embedding cache path
    #[arg(long)]
    pub cache_path: Option<PathBuf>,

    /// Use deterministic offline embeddings instead of the API
    #[arg(long)]
    pub offline: bool,
}

/// Clustering options
#[derive(Args, Debug, Clone, Default)]
pub struct PartitionArgs {
    /// Number of clusters
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Random seed for clustering and projection
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Options for the full pipeline
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub partition: PartitionArgs,

    /// Override the export path
    #[arg(long)]
    pub clusters_path: Option<PathBuf>,

    /// Override the plot path
    #[arg(long)]
    pub plot_path: Option<PathBuf>,

    /// Skip the scatter plot
    #[arg(long)]
    pub no_plot: bool,

    /// Skip vector index sync
    #[arg(long)]
    pub no_index: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run_defaults() {
        let cli = Cli::parse_from(["reqcluster", "run"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.partition.clusters, None);
                assert!(!args.no_plot);
                assert!(!args.input.offline);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_run_with_flags() {
        let cli = Cli::parse_from([
            "reqcluster",
            "run",
            "-k",
            "5",
            "--seed",
            "7",
            "--corpus",
            "reqs.md",
            "--offline",
            "--no-index",
            "--plot-path",
            "out/plot.png",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.partition.clusters, Some(5));
                assert_eq!(args.partition.seed, Some(7));
                assert_eq!(args.input.corpus, Some(PathBuf::from("reqs.md")));
                assert!(args.input.offline);
                assert!(args.no_index);
                assert_eq!(args.plot_path, Some(PathBuf::from("out/plot.png")));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_embed() {
        let cli = Cli::parse_from(["reqcluster", "embed", "--cache-path", "/tmp/e.txt"]);
        match cli.command {
            Commands::Embed { input } => {
                assert_eq!(input.cache_path, Some(PathBuf::from("/tmp/e.txt")))
            }
            _ => panic!("Expected Embed command"),
        }
    }

    #[test]
    fn test_cli_export() {
        let cli = Cli::parse_from(["reqcluster", "export", "--clusters", "3"]);
        match cli.command {
            Commands::Export { partition, .. } => assert_eq!(partition.clusters, Some(3)),
            _ => panic!("Expected Export command"),
        }
    }

    #[test]
    fn test_cli_with_config_and_log_level() {
        let cli = Cli::parse_from([
            "reqcluster",
            "--config",
            "/path/to/config.toml",
            "run",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }
}
