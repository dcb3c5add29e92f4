//! # reqcluster-types
//!
//! Shared data model and configuration for reqcluster.
//!
//! ## Contents
//! - `Corpus`: ordered, non-empty text items; position is identity
//! - `Vector`: an embedding, fixed dimension per run
//! - `Settings`: layered configuration (defaults, file, env, CLI)

pub mod config;
pub mod corpus;
pub mod error;

pub use config::{
    EmbeddingSettings, IndexSettings, OutputSettings, PartitionSettings, ProjectionSettings,
    Settings, OPENAI_API_KEY_ENV, PINECONE_API_KEY_ENV,
};
pub use corpus::{Corpus, Vector};
pub use error::CoreError;
