//! Visualization error types.

use thiserror::Error;

/// Errors that can occur while projecting or rendering.
#[derive(Debug, Error)]
pub enum VizError {
    /// More clusters than distinct colors
    #[error("Palette has {palette} colors but {groups} clusters need one each")]
    InsufficientPalette { groups: usize, palette: usize },

    /// Vectors disagree on dimension
    #[error("Dimension mismatch at item {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Points and assignments differ in length
    #[error("Got {points} points but {labels} cluster labels")]
    LengthMismatch { points: usize, labels: usize },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
