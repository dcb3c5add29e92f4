//! Error types shared across reqcluster crates.

use thiserror::Error;

/// Errors raised while loading configuration or the corpus.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error (missing credential, invalid value, unreadable file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
