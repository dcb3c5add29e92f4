//! reqcluster
//!
//! Groups requirement statements into semantically coherent clusters and
//! renders a 2D map of the grouping.
//!
//! # Usage
//!
//! ```bash
//! reqcluster run [--corpus FILE] [-k CLUSTERS] [--seed SEED] [--offline]
//! reqcluster embed [--corpus FILE]
//! reqcluster export [--corpus FILE] [-k CLUSTERS]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (<config dir>/reqcluster/config.toml)
//! 3. Environment variables (REQCLUSTER_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use reqcluster_cli::{embed_only, export_only, run_pipeline, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            run_pipeline(cli.config.as_deref(), cli.log_level.as_deref(), args).await?;
        }
        Commands::Embed { input } => {
            embed_only(cli.config.as_deref(), cli.log_level.as_deref(), input).await?;
        }
        Commands::Export {
            input,
            partition,
            clusters_path,
        } => {
            export_only(
                cli.config.as_deref(),
                cli.log_level.as_deref(),
                input,
                partition,
                clusters_path,
            )
            .await?;
        }
    }

    Ok(())
}
