//! Map figures: a greyscale hillshade with a terrace raster draped over it.
use anyhow::Result;
use image::imageops::{self, FilterType};
use image::{Rgb as Pixel, RgbImage};

use terrace_core::raster::EnviRaster;

use super::{draw_colour_bar, draw_to_image, ColourBar};
use crate::colour::{blend, discrete_index, discrete_rainbow, reds, Rgb, WHITE};
use crate::figure::RenderConfig;

/// Share of the figure width taken by the map.
const MAP_FRACTION: f64 = 0.85;

/// How the draped raster is coloured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drape {
    /// Discrete rainbow with one class per accepted terrace.
    TerraceIds { n_colours: usize },
    /// Sequential reds over the relief range.
    Relief,
}

impl Drape {
    fn title(self) -> &'static str {
        match self {
            Self::TerraceIds { .. } => "Terrace ID",
            Self::Relief => "Elevation above channel (m)",
        }
    }
}

fn grey(v: f32, lo: f32, hi: f32) -> Rgb {
    if !v.is_finite() {
        return WHITE;
    }
    let t = if hi > lo { (v - lo) / (hi - lo) } else { 0.5 };
    let g = (t.clamp(0.0, 1.0) * 255.0).round() as u8;
    [g, g, g]
}

/// Per-pixel composite at raster resolution. Hillshade NaN cells render white;
/// drape cells for which `colour_of` gives `None` leave the hillshade visible.
pub fn compose_overlay<F>(
    hillshade: &EnviRaster,
    drape: &EnviRaster,
    colour_of: F,
    alpha: f32,
) -> Result<RgbImage>
where
    F: Fn(f32) -> Option<Rgb>,
{
    hillshade.ensure_same_shape(drape)?;
    let (lo, hi) = hillshade.value_range().unwrap_or((0.0, 1.0));
    let img = RgbImage::from_fn(hillshade.width as u32, hillshade.height as u32, |col, row| {
        let (row, col) = (row as usize, col as usize);
        let base = grey(hillshade.get(row, col), lo, hi);
        let v = drape.get(row, col);
        let px = match v.is_finite().then(|| colour_of(v)).flatten() {
            Some(colour) => blend(base, colour, alpha),
            None => base,
        };
        Pixel(px)
    });
    Ok(img)
}

/// Map size in pixels: `MAP_FRACTION` of the figure width, raster aspect kept.
fn map_size(cfg: &RenderConfig, width: usize, height: usize) -> (u32, u32) {
    let map_w = ((cfg.width_px() as f64 * MAP_FRACTION) as u32).max(1);
    let scale = map_w as f64 / width.max(1) as f64;
    let map_h = ((height as f64 * scale).round() as u32).max(1);
    (map_w, map_h)
}

/// Colour function and legend for `drape` over its finite value range.
fn drape_colours(drape: &EnviRaster, style: Drape) -> (Box<dyn Fn(f32) -> Option<Rgb>>, ColourBar) {
    let (lo, hi) = drape
        .value_range()
        .map(|(lo, hi)| (lo as f64, hi as f64))
        .unwrap_or((0.0, 1.0));
    let title = style.title().to_string();
    match style {
        Drape::TerraceIds { n_colours } => {
            let n = n_colours.max(1);
            let colours = discrete_rainbow(n);
            let labels = (0..n)
                .map(|i| format!("{:.0}", lo + (hi - lo) * i as f64 / n as f64))
                .collect();
            let lookup = colours.clone();
            let colour_of: Box<dyn Fn(f32) -> Option<Rgb>> =
                Box::new(move |v| Some(lookup[discrete_index(v as f64, lo, hi, n)]));
            (colour_of, ColourBar::Discrete { labels, colours, title })
        }
        Drape::Relief => {
            let colour_of: Box<dyn Fn(f32) -> Option<Rgb>> = Box::new(move |v| {
                let t = if hi > lo { (v as f64 - lo) / (hi - lo) } else { 0.0 };
                Some(reds(t))
            });
            (colour_of, ColourBar::Continuous { lo, hi, ramp: reds, title })
        }
    }
}

/// Hillshade with `drape` on top, scaled to the configured figure width, and a
/// colour bar on the right.
pub fn render_draped_raster(
    hillshade: &EnviRaster,
    drape: &EnviRaster,
    style: Drape,
    cfg: &RenderConfig,
) -> Result<RgbImage> {
    let (colour_of, bar) = drape_colours(drape, style);
    let overlay = compose_overlay(hillshade, drape, colour_of, cfg.drape_alpha)?;

    let (map_w, map_h) = map_size(cfg, hillshade.width, hillshade.height);
    let map = imageops::resize(&overlay, map_w, map_h, FilterType::Nearest);

    let margin = cfg.font_px().round() as u32;
    let fig_w = cfg.width_px().max(map_w + margin);
    let fig_h = map_h + 2 * margin;
    let mut canvas = draw_to_image((fig_w, fig_h), |root| {
        let (_, bar_area) = root.split_horizontally(map_w + margin);
        draw_colour_bar(&bar_area, &bar, cfg)?;
        root.present()?;
        Ok(())
    })?;
    imageops::overlay(&mut canvas, &map, margin as i64 / 2, margin as i64);
    Ok(canvas)
}
