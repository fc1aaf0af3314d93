//! ENVI rasters (`.bil` data with a sibling `.hdr`), read through GDAL.
//!
//! Only the first band is read. Samples are converted to f32; cells equal to
//! the band's no-data value (the header's `data ignore value`) become NaN.
//! Row 0 is the northern edge, as in the file.
use std::path::{Path, PathBuf};

use gdal::Dataset;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TerraceError};

pub const RASTER_EXT: &str = "bil";
pub const HILLSHADE_SUFFIX: &str = "_hs";
pub const TERRACE_ID_SUFFIX: &str = "_terrace_IDs";
pub const TERRACE_RELIEF_SUFFIX: &str = "_terrace_relief_final";

/// North-up affine georeferencing taken from the header `map info`.
/// Rotation terms are not carried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X of the upper-left corner of the upper-left pixel.
    pub origin_x: f64,
    /// Y of the upper-left corner of the upper-left pixel.
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up rasters.
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Map coordinates of the centre of `(row, col)`.
    pub fn pixel_centre(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    pub fn cell_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs()
    }

    /// From GDAL's `[origin_x, pixel_width, rot, origin_y, rot, pixel_height]`.
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self { origin_x: gt[0], origin_y: gt[3], pixel_width: gt[1], pixel_height: gt[5] }
    }
}

/// First band of an ENVI raster, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct EnviRaster {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub geo: Option<GeoTransform>,
    pub nodata: Option<f64>,
}

impl EnviRaster {
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    /// Area of one cell in map units², when georeferenced.
    pub fn cell_area(&self) -> Option<f64> {
        self.geo.map(|g| g.cell_area())
    }

    /// (min, max) over finite cells; `None` when every cell is NaN.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn ensure_same_shape(&self, other: &EnviRaster) -> Result<()> {
        if self.width != other.width || self.height != other.height {
            return Err(TerraceError::SizeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: other.width,
                height: other.height,
            });
        }
        Ok(())
    }

    /// Read the first band of `path` through GDAL's ENVI driver. The sibling
    /// header (`<stem>.hdr`, or `<path>.hdr`) must exist.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(TerraceError::FileNotFound { path: path.to_path_buf() });
        }
        header_path(path)?;
        let gdal_err = |source| TerraceError::Gdal { path: path.to_path_buf(), source };

        let dataset = Dataset::open(path).map_err(gdal_err)?;
        let (width, height) = dataset.raster_size();
        let cells = cell_count(path, width, height)?;
        let band = dataset.rasterband(1).map_err(gdal_err)?;
        let nodata = band.no_data_value();

        let buffer = band
            .read_as::<f32>((0, 0), (width, height), (width, height), None)
            .map_err(gdal_err)?;
        let mut data = buffer.data().to_vec();
        if data.len() != cells {
            return Err(TerraceError::InvalidRaster {
                path: path.to_path_buf(),
                reason: format!("read {} cells, expected {cells}", data.len()),
            });
        }
        if let Some(nd) = nodata {
            for v in data.iter_mut().filter(|v| f64::from(**v) == nd) {
                *v = f32::NAN;
            }
        }

        let geo = dataset.geo_transform().ok().map(GeoTransform::from_gdal);
        debug!(path = %path.display(), width, height, ?nodata, "read ENVI raster");
        Ok(Self { data, width, height, geo, nodata })
    }
}

/// `width × height`, or an error when the product does not fit in memory
/// addressing.
fn cell_count(path: &Path, width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .filter(|&n| n.checked_mul(std::mem::size_of::<f32>()).is_some())
        .ok_or_else(|| TerraceError::InvalidRaster {
            path: path.to_path_buf(),
            reason: format!("{width}x{height} cells overflow"),
        })
}

/// `<data_dir>/<prefix><suffix>.bil`.
pub fn raster_path(data_dir: &Path, prefix: &str, suffix: &str) -> PathBuf {
    data_dir.join(format!("{prefix}{suffix}.{RASTER_EXT}"))
}

fn header_path(data_path: &Path) -> Result<PathBuf> {
    let replaced = data_path.with_extension("hdr");
    if replaced.is_file() {
        return Ok(replaced);
    }
    let mut appended = data_path.as_os_str().to_owned();
    appended.push(".hdr");
    let appended = PathBuf::from(appended);
    if appended.is_file() {
        return Ok(appended);
    }
    Err(TerraceError::FileNotFound { path: replaced })
}
