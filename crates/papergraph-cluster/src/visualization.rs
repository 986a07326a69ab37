//! Projected coordinates table and a cluster-coloured scatter plot.

use csv::Writer;
use image::{Rgb, RgbImage};
use ndarray::ArrayView2;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::abstracts::AbstractsTable;
use crate::error::ClusterError;

pub const PLOT_WIDTH: u32 = 800;
pub const PLOT_HEIGHT: u32 = 600;
const MARGIN: u32 = 40;
const POINT_RADIUS: i64 = 4;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([200, 200, 200]);

/// Cluster colours, reused cyclically past ten clusters.
const PALETTE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

pub fn cluster_color(label: usize) -> Rgb<u8> {
    Rgb(PALETTE[label % PALETTE.len()])
}

/// `<stem>_projection.csv` beside the clustered table.
pub fn projection_path(clustered: &Path) -> PathBuf {
    let stem = clustered.file_stem().and_then(|s| s.to_str()).unwrap_or("abstracts_clustered");
    clustered.with_file_name(format!("{}_projection.csv", stem))
}

fn check_lengths(
    rows: usize,
    coords: ArrayView2<f64>,
    labels: &[usize],
) -> Result<(), ClusterError> {
    if coords.nrows() != rows {
        return Err(ClusterError::DimensionMismatch { expected: rows, found: coords.nrows() });
    }
    if labels.len() != rows {
        return Err(ClusterError::DimensionMismatch { expected: rows, found: labels.len() });
    }
    Ok(())
}

fn create_parent(path: &Path) -> Result<(), ClusterError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Writes `id,x,y,cluster`, one line per table row.
pub fn write_projection<W: Write>(
    writer: W,
    table: &AbstractsTable,
    coords: ArrayView2<f64>,
    labels: &[usize],
) -> Result<(), ClusterError> {
    check_lengths(table.len(), coords, labels)?;

    let mut writer = Writer::from_writer(writer);
    writer.write_record(["id", "x", "y", "cluster"])?;
    for (row, label) in labels.iter().enumerate() {
        writer.write_record([
            table.id(row).to_string(),
            coords[[row, 0]].to_string(),
            coords[[row, 1]].to_string(),
            label.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_projection_to_path(
    path: &Path,
    table: &AbstractsTable,
    coords: ArrayView2<f64>,
    labels: &[usize],
) -> Result<(), ClusterError> {
    create_parent(path)?;
    let file = std::fs::File::create(path)?;
    write_projection(file, table, coords, labels)?;
    info!("Projected coordinates written to {}", path.display());
    Ok(())
}

/// Draws every projected point as a dot coloured by its cluster.
///
/// Both axes are scaled independently to fill the plot area; a flat axis
/// puts its points on the centre line.
pub fn render_scatter(coords: ArrayView2<f64>, labels: &[usize]) -> RgbImage {
    let mut img = RgbImage::from_pixel(PLOT_WIDTH, PLOT_HEIGHT, BACKGROUND);
    let (left, right) = (MARGIN, PLOT_WIDTH - MARGIN);
    let (top, bottom) = (MARGIN, PLOT_HEIGHT - MARGIN);

    for x in left..=right {
        img.put_pixel(x, bottom, AXIS);
    }
    for y in top..=bottom {
        img.put_pixel(left, y, AXIS);
    }

    let x_range = bounds(coords.column(0).iter().copied());
    let y_range = bounds(coords.column(1).iter().copied());

    for (point, label) in coords.outer_iter().zip(labels) {
        let px = scale(point[0], x_range, left, right);
        // Image rows grow downwards
        let py = bottom as i64 - (scale(point[1], y_range, top, bottom) - top as i64);
        draw_dot(&mut img, px, py, cluster_color(*label));
    }
    img
}

pub fn save_scatter(
    path: &Path,
    coords: ArrayView2<f64>,
    labels: &[usize],
) -> Result<(), ClusterError> {
    check_lengths(labels.len(), coords, labels)?;
    create_parent(path)?;
    render_scatter(coords, labels).save(path)?;
    info!("Cluster plot written to {}", path.display());
    Ok(())
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn scale(value: f64, (lo, hi): (f64, f64), start: u32, end: u32) -> i64 {
    let span = (end - start) as f64;
    let t = if hi - lo > f64::EPSILON { (value - lo) / (hi - lo) } else { 0.5 };
    start as i64 + (t * span).round() as i64
}

fn draw_dot(img: &mut RgbImage, cx: i64, cy: i64, color: Rgb<u8>) {
    for dy in -POINT_RADIUS..=POINT_RADIUS {
        for dx in -POINT_RADIUS..=POINT_RADIUS {
            if dx * dx + dy * dy > POINT_RADIUS * POINT_RADIUS {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && x < img.width() as i64 && y < img.height() as i64 {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
