//! Figure sizing, output formats and the render configuration passed to every
//! renderer.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

/// Journal-driven figure widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum SizeFormat {
    /// 16 in wide.
    #[value(name = "big")]
    #[serde(rename = "big")]
    Big,
    /// 6.25 in wide.
    #[value(name = "geomorphology")]
    #[serde(rename = "geomorphology")]
    Geomorphology,
    /// 4.92126 in (125 mm) wide.
    #[default]
    #[value(name = "ESURF", alias = "esurf")]
    #[serde(rename = "ESURF")]
    Esurf,
}

impl SizeFormat {
    pub fn width_inches(self) -> f64 {
        match self {
            Self::Big => 16.0,
            Self::Geomorphology => 6.25,
            Self::Esurf => 4.92126,
        }
    }

    /// Height of the long-profile figure.
    pub fn profile_height_inches(self) -> f64 {
        match self {
            Self::Big => 9.0,
            Self::Geomorphology => 3.5,
            Self::Esurf => 3.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigFormat {
    #[default]
    Png,
    #[value(alias = "jpeg")]
    Jpg,
    Bmp,
    #[value(alias = "tif")]
    Tiff,
}

impl FigFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpg => ImageFormat::Jpeg,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
        }
    }
}

/// Styling shared by all figures. Passed explicitly to each renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub size_format: SizeFormat,
    pub fig_format: FigFormat,
    pub dpi: u32,
    pub font_family: String,
    /// Label size in points.
    pub font_size: f64,
    /// Opacity of draped rasters over the hillshade.
    pub drape_alpha: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            size_format: SizeFormat::default(),
            fig_format: FigFormat::default(),
            dpi: 300,
            font_family: "sans-serif".to_string(),
            font_size: 10.0,
            drape_alpha: 0.8,
        }
    }
}

impl RenderConfig {
    pub fn width_px(&self) -> u32 {
        (self.size_format.width_inches() * self.dpi as f64).round() as u32
    }

    pub fn profile_size_px(&self) -> (u32, u32) {
        let h = (self.size_format.profile_height_inches() * self.dpi as f64).round() as u32;
        (self.width_px(), h)
    }

    /// Typographic points to pixels at the configured dpi.
    pub fn pt_to_px(&self, pt: f64) -> f64 {
        pt * self.dpi as f64 / 72.0
    }

    pub fn font_px(&self) -> f64 {
        self.pt_to_px(self.font_size)
    }
}

/// `<data_dir>/<prefix><suffix>.<ext>`.
pub fn output_path(data_dir: &Path, prefix: &str, suffix: &str, format: FigFormat) -> PathBuf {
    data_dir.join(format!("{prefix}{suffix}.{}", format.extension()))
}

pub fn save_image(img: &RgbImage, path: &Path, format: FigFormat) -> Result<()> {
    img.save_with_format(path, format.image_format())
        .with_context(|| format!("failed to write {}", path.display()))
}
