//! Scatter plot rendering.
//!
//! Draws one alpha-blended marker per item, colored by cluster id, with a
//! title, axis labels, tick marks, a legend of the clusters present beside
//! the plot, and a caption. Output is an in-memory RGB image or a PNG file.

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use tempfile::NamedTempFile;
use tracing::info;

use reqcluster_partition::ClusterAssignment;

use crate::error::VizError;
use crate::font::{draw_text, draw_text_vertical, text_height, text_width};
use crate::palette::Palette;
use crate::tsne::Point2D;

pub const TITLE: &str = "Requirement Clusters (t-SNE Visualization)";
pub const X_LABEL: &str = "Dimension 1 (Reduced)";
pub const Y_LABEL: &str = "Dimension 2 (Reduced)";
pub const LEGEND_TITLE: &str = "Clusters";
pub const CAPTION: &str = "This diagram visualizes semantic similarity of requirements. \
Points close together belong to the same domain/microservice.";

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const FRAME: Rgb<u8> = Rgb([64, 64, 64]);
const LEGEND_BORDER: Rgb<u8> = Rgb([204, 204, 204]);

const MIN_SIDE: u32 = 200;
const TICKS: usize = 5;
const TICK_LENGTH: i64 = 8;
const DATA_PADDING: f64 = 0.05;

/// Canvas and marker settings.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub marker_radius: u32,
    /// Marker opacity in `[0, 1]`
    pub alpha: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1800,
            height: 1200,
            marker_radius: 12,
            alpha: 0.6,
        }
    }
}

/// Pixel geometry derived from the canvas size.
#[derive(Debug, Clone, Copy)]
struct Layout {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
    text_scale: u32,
}

impl Layout {
    fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self {
            left: (w * 0.10).round() as i64,
            top: (h * 0.09).round() as i64,
            right: (w * 0.84).round() as i64,
            bottom: (h * 0.80).round() as i64,
            text_scale: (width / 600).max(1),
        }
    }

    fn center_x(&self) -> i64 {
        (self.left + self.right) / 2
    }
}

/// Padded data extents.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Bounds {
    fn of(points: &[Point2D]) -> Self {
        let (min_x, max_x) = padded(points.iter().map(|p| p.x));
        let (min_y, max_y) = padded(points.iter().map(|p| p.y));
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    fn to_pixel(&self, layout: &Layout, point: &Point2D) -> (i64, i64) {
        let fx = (point.x - self.min_x) / (self.max_x - self.min_x);
        let fy = (point.y - self.min_y) / (self.max_y - self.min_y);
        let x = layout.left as f64 + fx * (layout.right - layout.left) as f64;
        let y = layout.bottom as f64 - fy * (layout.bottom - layout.top) as f64;
        (x.round() as i64, y.round() as i64)
    }
}

fn padded(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (-1.0, 1.0);
    }
    let span = max - min;
    if span <= f64::EPSILON {
        return (min - 0.5, max + 0.5);
    }
    (min - span * DATA_PADDING, max + span * DATA_PADDING)
}

fn format_tick(value: f64, span: f64) -> String {
    if span >= 10.0 {
        format!("{:.0}", value)
    } else if span >= 1.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Cluster scatter plot renderer.
#[derive(Debug, Clone, Default)]
pub struct ScatterPlot {
    config: RenderConfig,
    palette: Palette,
}

impl ScatterPlot {
    pub fn new(config: RenderConfig, palette: Palette) -> Self {
        Self { config, palette }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Render `points` colored by `assignment`.
    ///
    /// Fails with `InsufficientPalette` when the assignment has more clusters
    /// than the palette has colors, whether or not every cluster is occupied.
    pub fn render(
        &self,
        points: &[Point2D],
        assignment: &ClusterAssignment,
    ) -> Result<RgbImage, VizError> {
        if points.len() != assignment.len() {
            return Err(VizError::LengthMismatch {
                points: points.len(),
                labels: assignment.len(),
            });
        }
        self.palette.ensure_covers(assignment.k())?;

        let (width, height) = (self.config.width, self.config.height);
        if width < MIN_SIDE || height < MIN_SIDE {
            return Err(VizError::InvalidInput(format!(
                "canvas {}x{} is smaller than {}x{}",
                width, height, MIN_SIDE, MIN_SIDE
            )));
        }

        let layout = Layout::new(width, height);
        let bounds = Bounds::of(points);
        let mut image = RgbImage::from_pixel(width, height, BACKGROUND);

        self.draw_axes(&mut image, &layout, &bounds);

        for (point, &label) in points.iter().zip(assignment.labels()) {
            let color = self.color(label)?;
            let (x, y) = bounds.to_pixel(&layout, point);
            fill_circle(
                &mut image,
                x,
                y,
                self.config.marker_radius as i64,
                color,
                self.config.alpha,
            );
        }

        let present: BTreeSet<usize> = assignment.labels().iter().copied().collect();
        self.draw_legend(&mut image, &layout, &present)?;
        draw_caption(&mut image, &layout);

        Ok(image)
    }

    /// Render and write a PNG, creating parent directories. The file is
    /// replaced atomically.
    pub fn render_to_file(
        &self,
        points: &[Point2D],
        assignment: &ClusterAssignment,
        path: impl AsRef<Path>,
    ) -> Result<(), VizError> {
        let image = self.render(points, assignment)?;
        write_png(&image, path.as_ref())
    }

    fn color(&self, cluster: usize) -> Result<Rgb<u8>, VizError> {
        self.palette
            .color(cluster)
            .map(|c| c.pixel())
            .ok_or(VizError::InsufficientPalette {
                groups: cluster + 1,
                palette: self.palette.len(),
            })
    }

    fn draw_axes(&self, image: &mut RgbImage, layout: &Layout, bounds: &Bounds) {
        let scale = layout.text_scale;
        let small = scale.saturating_sub(1).max(1);

        let title_scale = scale + 1;
        draw_text(
            image,
            layout.center_x() - text_width(TITLE, title_scale) as i64 / 2,
            (layout.top - text_height(title_scale) as i64) / 2,
            TITLE,
            title_scale,
            INK,
        );

        draw_rect(image, layout.left, layout.top, layout.right, layout.bottom, FRAME);

        let x_span = bounds.max_x - bounds.min_x;
        let y_span = bounds.max_y - bounds.min_y;
        for t in 0..TICKS {
            let f = t as f64 / (TICKS - 1) as f64;

            let x = layout.left + (f * (layout.right - layout.left) as f64).round() as i64;
            draw_vline(image, x, layout.bottom, layout.bottom + TICK_LENGTH, FRAME);
            let label = format_tick(bounds.min_x + f * x_span, x_span);
            draw_text(
                image,
                x - text_width(&label, small) as i64 / 2,
                layout.bottom + TICK_LENGTH + 6,
                &label,
                small,
                INK,
            );

            let y = layout.bottom - (f * (layout.bottom - layout.top) as f64).round() as i64;
            draw_hline(image, layout.left - TICK_LENGTH, layout.left, y, FRAME);
            let label = format_tick(bounds.min_y + f * y_span, y_span);
            draw_text(
                image,
                layout.left - TICK_LENGTH - 6 - text_width(&label, small) as i64,
                y - text_height(small) as i64 / 2,
                &label,
                small,
                INK,
            );
        }

        draw_text(
            image,
            layout.center_x() - text_width(X_LABEL, scale) as i64 / 2,
            layout.bottom + TICK_LENGTH + 6 + text_height(small) as i64 + 24,
            X_LABEL,
            scale,
            INK,
        );

        let y_center = (layout.top + layout.bottom) / 2;
        draw_text_vertical(
            image,
            layout.left / 4,
            y_center + text_width(Y_LABEL, scale) as i64 / 2,
            Y_LABEL,
            scale,
            INK,
        );
    }

    fn draw_legend(
        &self,
        image: &mut RgbImage,
        layout: &Layout,
        present: &BTreeSet<usize>,
    ) -> Result<(), VizError> {
        let scale = layout.text_scale.saturating_sub(1).max(1);
        let line = text_height(scale) as i64;
        let row = line + 14;
        let pad = 14i64;
        let radius = (self.config.marker_radius as i64 * 2 / 3).max(3);

        let labels: Vec<(usize, String)> = present
            .iter()
            .map(|&cluster| (cluster, format!("Cluster {}", cluster)))
            .collect();
        let text_max = labels
            .iter()
            .map(|(_, label)| text_width(label, scale) as i64)
            .max()
            .unwrap_or(0);
        let entry_width = 2 * radius + 10 + text_max;
        let box_width = 2 * pad + entry_width.max(text_width(LEGEND_TITLE, scale) as i64);
        let box_height = 2 * pad + row * (labels.len() as i64 + 1) - 14;

        // Outside the plot area, top-aligned with it.
        let x0 = layout.right + 24;
        let y0 = layout.top;
        fill_rect(image, x0, y0, x0 + box_width, y0 + box_height, BACKGROUND);
        draw_rect(image, x0, y0, x0 + box_width, y0 + box_height, LEGEND_BORDER);

        draw_text(
            image,
            x0 + (box_width - text_width(LEGEND_TITLE, scale) as i64) / 2,
            y0 + pad,
            LEGEND_TITLE,
            scale,
            INK,
        );

        for (position, (cluster, label)) in labels.iter().enumerate() {
            let y = y0 + pad + row * (position as i64 + 1);
            let color = self.color(*cluster)?;
            fill_circle(
                image,
                x0 + pad + radius,
                y + line / 2,
                radius,
                color,
                self.config.alpha,
            );
            draw_text(image, x0 + pad + 2 * radius + 10, y, label, scale, INK);
        }
        Ok(())
    }
}

fn draw_caption(image: &mut RgbImage, layout: &Layout) {
    let scale = layout.text_scale.saturating_sub(1).max(1);
    let width = image.width() as i64;
    let height = image.height() as i64;
    let y = height - (height - layout.bottom) / 4 - text_height(scale) as i64;
    draw_text(
        image,
        (width - text_width(CAPTION, scale) as i64) / 2,
        y,
        CAPTION,
        scale,
        INK,
    );
}

/// Write `image` as PNG through a temporary file in the target directory.
pub fn write_png(image: &RgbImage, path: &Path) -> Result<(), VizError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir)?;

    let mut temp = NamedTempFile::new_in(&dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        image.write_to(&mut writer, ImageFormat::Png)?;
        writer.flush()?;
    }
    temp.persist(path).map_err(|e| VizError::Io(e.error))?;

    info!(path = ?path, width = image.width(), height = image.height(), "Plot saved");
    Ok(())
}

fn blend(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>, alpha: f64) {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return;
    }
    let alpha = alpha.clamp(0.0, 1.0);
    let pixel = image.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        let mixed = color.0[c] as f64 * alpha + pixel.0[c] as f64 * (1.0 - alpha);
        pixel.0[c] = mixed.round() as u8;
    }
}

fn fill_circle(image: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>, alpha: f64) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                blend(image, cx + dx, cy + dy, color, alpha);
            }
        }
    }
}

fn fill_rect(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    for y in y0..=y1 {
        for x in x0..=x1 {
            blend(image, x, y, color, 1.0);
        }
    }
}

fn draw_hline(image: &mut RgbImage, x0: i64, x1: i64, y: i64, color: Rgb<u8>) {
    for x in x0..=x1 {
        blend(image, x, y, color, 1.0);
    }
}

fn draw_vline(image: &mut RgbImage, x: i64, y0: i64, y1: i64, color: Rgb<u8>) {
    for y in y0..=y1 {
        blend(image, x, y, color, 1.0);
    }
}

fn draw_rect(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    draw_hline(image, x0, x1, y0, color);
    draw_hline(image, x0, x1, y1, color);
    draw_vline(image, x0, y0, y1, color);
    draw_vline(image, x1, y0, y1, color);
}
