//! Per-terrace dip diagnostic: points, fitted plane and dip arrow in 3D.
use anyhow::{Context, Result};
use image::RgbImage;
use plotters::coord::Shift;
use plotters::prelude::*;

use terrace_core::plane::DipEstimate;

use super::{draw_to_image, font, padded};
use crate::figure::RenderConfig;

const MAX_POINTS: usize = 2000;
const WIREFRAME_STEPS: usize = 20;
const ARROW_LENGTH: f64 = 50.0;

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => (0..n).map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64).collect(),
    }
}

/// Every k-th point so that at most `MAX_POINTS` are drawn.
fn subsample(points: &[[f64; 3]]) -> impl Iterator<Item = &[f64; 3]> {
    let step = points.len().div_ceil(MAX_POINTS).max(1);
    points.iter().step_by(step)
}

fn axis_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.filter(|v| v.is_finite()).fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// End of the dip arrow in map coordinates `[x, y, z]`.
pub fn arrow_tip(estimate: &DipEstimate) -> [f64; 3] {
    let [cx, cy, cz] = estimate.centroid;
    let d = estimate.angles.dip_direction;
    [
        cx + ARROW_LENGTH * d.cos(),
        cy + ARROW_LENGTH * d.sin(),
        cz - ARROW_LENGTH * estimate.angles.dip_slope,
    ]
}

pub fn render_dip(estimate: &DipEstimate, points: &[[f64; 3]], cfg: &RenderConfig) -> Result<RgbImage> {
    let w = cfg.width_px();
    let h = (w as f64 * 0.8).round() as u32;
    draw_to_image((w, h), |root| draw_dip(root, estimate, points, cfg))
}

pub fn draw_dip<DB>(
    root: DrawingArea<DB, Shift>,
    estimate: &DipEstimate,
    points: &[[f64; 3]],
    cfg: &RenderConfig,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let (x_lo, x_hi) = axis_range(points.iter().map(|p| p[0])).context("no points to plot")?;
    let (y_lo, y_hi) = axis_range(points.iter().map(|p| p[1])).context("no points to plot")?;

    let plane = estimate.plane;
    let xs = linspace(x_lo, x_hi, WIREFRAME_STEPS);
    let ys = linspace(y_lo, y_hi, WIREFRAME_STEPS);
    let tip = arrow_tip(estimate);
    let corners = [(x_lo, y_lo), (x_lo, y_hi), (x_hi, y_lo), (x_hi, y_hi)];
    let (z_lo, z_hi) = axis_range(
        points
            .iter()
            .map(|p| p[2])
            .chain(corners.iter().map(|&(x, y)| plane.elevation_at(x, y)))
            .chain([estimate.centroid[2], tip[2]]),
    )
    .context("no finite elevations to plot")?;

    // Plotters' vertical axis is the second coordinate: (x, z, y).
    let mut chart = ChartBuilder::on(&root)
        .margin((cfg.font_px() * 0.5) as u32)
        .caption(estimate.terrace_id.to_string(), font(cfg, 1.2))
        .build_cartesian_3d(
            padded(x_lo.min(tip[0]), x_hi.max(tip[0])),
            padded(z_lo, z_hi),
            padded(y_lo.min(tip[1]), y_hi.max(tip[1])),
        )?;
    chart.with_projection(|mut pb| {
        pb.yaw = 0.6;
        pb.pitch = 0.35;
        pb.scale = 0.85;
        pb.into_matrix()
    });
    chart.configure_axes().label_style(font(cfg, 0.6)).draw()?;

    let radius = cfg.pt_to_px(0.75).round().max(1.0) as u32;
    chart.draw_series(
        subsample(points).map(|p| Circle::new((p[0], p[2], p[1]), radius, BLUE.mix(0.6).filled())),
    )?;

    let wire = BLACK.stroke_width(1);
    for &y in &ys {
        chart.draw_series(LineSeries::new(
            xs.iter().map(|&x| (x, plane.elevation_at(x, y), y)),
            wire,
        ))?;
    }
    for &x in &xs {
        chart.draw_series(LineSeries::new(
            ys.iter().map(|&y| (x, plane.elevation_at(x, y), y)),
            wire,
        ))?;
    }

    let [cx, cy, cz] = estimate.centroid;
    chart.draw_series(LineSeries::new(
        [(cx, cz, cy), (tip[0], tip[2], tip[1])],
        BLACK.stroke_width(4),
    ))?;

    root.present()?;
    Ok(())
}
