//! Figure renderers. Each takes its data plus an explicit [`RenderConfig`] and
//! returns an RGB image; saving is left to the caller.
pub mod dip;
pub mod profile;
pub mod raster;

use std::ops::Range;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use image::RgbImage;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontDesc, FontFamily, FontStyle};

use crate::colour::Rgb;
use crate::figure::RenderConfig;

/// Faces rasterised by plotters' ab_glyph backend. There is no serif face
/// among the bundled fonts, so serif text uses the sans face.
const EMBEDDED_FONTS: [(&str, &[u8]); 3] = [
    ("sans-serif", epaint_default_fonts::UBUNTU_LIGHT),
    ("serif", epaint_default_fonts::UBUNTU_LIGHT),
    ("monospace", epaint_default_fonts::HACK_REGULAR),
];

static FONTS: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Register [`EMBEDDED_FONTS`] with plotters, once per process.
pub(crate) fn register_fonts() -> Result<()> {
    FONTS
        .get_or_init(|| {
            for (family, bytes) in EMBEDDED_FONTS {
                register_font(family, FontStyle::Normal, bytes)
                    .map_err(|_| format!("bundled {family} font is not a valid TrueType face"))?;
            }
            Ok(())
        })
        .clone()
        .map_err(anyhow::Error::msg)
}

/// Draw into an in-memory white canvas of `size` pixels.
pub(crate) fn draw_to_image<F>(size: (u32, u32), draw: F) -> Result<RgbImage>
where
    F: FnOnce(DrawingArea<BitMapBackend<'_>, Shift>) -> Result<()>,
{
    register_fonts()?;
    let (w, h) = size;
    let mut buf = vec![255u8; w as usize * h as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buf, size).into_drawing_area();
        draw(root)?;
    }
    RgbImage::from_raw(w, h, buf).with_context(|| format!("figure buffer is not {w}x{h}"))
}

pub(crate) fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c[0], c[1], c[2])
}

/// Only the embedded families can be drawn; other names fall back to sans-serif.
fn font_family(cfg: &RenderConfig) -> FontFamily<'static> {
    match cfg.font_family.as_str() {
        "serif" => FontFamily::Serif,
        "monospace" => FontFamily::Monospace,
        _ => FontFamily::SansSerif,
    }
}

/// Configured font, scaled relative to the base label size.
pub(crate) fn font(cfg: &RenderConfig, scale: f64) -> FontDesc<'static> {
    FontDesc::new(font_family(cfg), cfg.font_px() * scale, FontStyle::Normal)
}

/// `[lo, hi]` widened by 5% each side; a zero-width range is widened around `lo`.
pub(crate) fn padded(lo: f64, hi: f64) -> Range<f64> {
    let span = hi - lo;
    let pad = if span > 0.0 { span * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    (lo - pad)..(hi + pad)
}

// ── Colour bar ────────────────────────────────────────────────────────────────

/// Legend drawn in a strip to the right of a figure.
pub enum ColourBar {
    /// One swatch per class, lowest class at the bottom.
    Discrete { labels: Vec<String>, colours: Vec<Rgb>, title: String },
    /// Gradient between `lo` and `hi`.
    Continuous { lo: f64, hi: f64, ramp: fn(f64) -> Rgb, title: String },
}

const GRADIENT_STEPS: usize = 64;

pub(crate) fn draw_colour_bar<DB>(
    area: &DrawingArea<DB, Shift>,
    bar: &ColourBar,
    cfg: &RenderConfig,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);
    let x0 = w / 10;
    let x1 = x0 + (w / 5).max(2);
    let top = h / 10;
    let bottom = h - h / 10;
    let label_x = x1 + w / 20;
    let label_font = font(cfg, 0.8);

    let swatch = |i: usize, n: usize| {
        let span = (bottom - top) as f64;
        let y_hi = bottom - (span * (i + 1) as f64 / n as f64).round() as i32;
        let y_lo = bottom - (span * i as f64 / n as f64).round() as i32;
        (y_hi, y_lo)
    };

    let title = match bar {
        ColourBar::Discrete { labels, colours, title } => {
            let n = colours.len();
            for (i, colour) in colours.iter().enumerate() {
                let (y_hi, y_lo) = swatch(i, n);
                area.draw(&Rectangle::new([(x0, y_hi), (x1, y_lo)], rgb(*colour).filled()))?;
                if let Some(label) = labels.get(i) {
                    let y_mid = (y_hi + y_lo) / 2;
                    area.draw(&Text::new(label.clone(), (label_x, y_mid), label_font.clone()))?;
                }
            }
            title
        }
        ColourBar::Continuous { lo, hi, ramp, title } => {
            for i in 0..GRADIENT_STEPS {
                let t = (i as f64 + 0.5) / GRADIENT_STEPS as f64;
                let (y_hi, y_lo) = swatch(i, GRADIENT_STEPS);
                area.draw(&Rectangle::new([(x0, y_hi), (x1, y_lo)], rgb(ramp(t)).filled()))?;
            }
            area.draw(&Text::new(format!("{lo:.1}"), (label_x, bottom), label_font.clone()))?;
            area.draw(&Text::new(format!("{hi:.1}"), (label_x, top), label_font.clone()))?;
            title
        }
    };
    area.draw(&Rectangle::new([(x0, top), (x1, bottom)], BLACK.stroke_width(1)))?;
    area.draw(&Text::new(title.clone(), (x0, top / 3), font(cfg, 0.9)))?;
    Ok(())
}
