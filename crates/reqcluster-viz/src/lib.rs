//! # reqcluster-viz
//!
//! 2D projection and cluster scatter plots.
//!
//! ## Features
//! - Exact t-SNE with seeded initialization
//! - Fixed 12-color palette; more clusters than colors is an error
//! - PNG rendering with an embedded bitmap font, no system fonts needed

pub mod error;
pub mod font;
pub mod palette;
pub mod render;
pub mod tsne;

use std::path::Path;

use reqcluster_partition::ClusterAssignment;
use reqcluster_types::{ProjectionSettings, Vector};

pub use error::VizError;
pub use palette::{NamedColor, Palette, DEFAULT_COLORS};
pub use render::{write_png, RenderConfig, ScatterPlot, CAPTION, TITLE};
pub use tsne::{project, Point2D, Tsne, TsneConfig};

/// Project `vectors` and write the cluster scatter plot to `path`.
///
/// The palette is checked before projecting so an oversized `k` fails fast.
pub fn visualize(
    vectors: &[Vector],
    assignment: &ClusterAssignment,
    projection: &ProjectionSettings,
    seed: u64,
    path: &Path,
) -> Result<Vec<Point2D>, VizError> {
    let plot = ScatterPlot::default();
    plot.palette().ensure_covers(assignment.k())?;

    let points = Tsne::new(TsneConfig::from(projection)).project(vectors, seed)?;
    plot.render_to_file(&points, assignment, path)?;
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_visualize_writes_plot() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("clusters.png");
        let vectors: Vec<Vector> = (0..6)
            .map(|i| vec![(i / 3) as f32 * 5.0, (i % 3) as f32 * 0.1])
            .collect();
        let assignment = ClusterAssignment::new(vec![0, 0, 0, 1, 1, 1], 2).unwrap();
        let settings = ProjectionSettings {
            iterations: 300,
            ..Default::default()
        };

        let points = visualize(&vectors, &assignment, &settings, 42, &path).unwrap();
        assert_eq!(points.len(), 6);
        assert!(path.exists());
    }

    #[test]
    fn test_visualize_rejects_oversized_k_without_writing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("clusters.png");
        let vectors: Vec<Vector> = (0..13).map(|i| vec![i as f32]).collect();
        let assignment = ClusterAssignment::new((0..13).collect(), 13).unwrap();

        let result = visualize(&vectors, &assignment, &ProjectionSettings::default(), 42, &path);
        assert!(matches!(result, Err(VizError::InsufficientPalette { .. })));
        assert!(!path.exists());
    }
}
