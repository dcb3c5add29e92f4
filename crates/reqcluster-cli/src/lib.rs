//! reqcluster command-line library.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, embed, export)
//! - `pipeline`: Stage orchestration shared by the commands

pub mod cli;
pub mod commands;
pub mod pipeline;

pub use cli::{Cli, Commands, InputArgs, PartitionArgs, RunArgs};
pub use commands::{
    apply_input_args, apply_partition_args, apply_run_args, embed_only, export_only, init_logging,
    load_settings, next_steps, run_pipeline,
};
pub use pipeline::{Pipeline, PipelineError, PipelineReport, Stages};
