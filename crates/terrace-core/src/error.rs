//! Error type shared by every stage of the terrace pipeline.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerraceError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("GDAL could not read {}: {source}", path.display())]
    Gdal {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("invalid raster {}: {reason}", path.display())]
    InvalidRaster { path: PathBuf, reason: String },

    #[error("raster size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    SizeMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error("terrace {terrace_id}: fitted plane is horizontal, dip direction is undefined")]
    DegeneratePlane { terrace_id: i64 },

    #[error("terrace {terrace_id}: points are collinear, plane is not determined")]
    CollinearPoints { terrace_id: i64 },

    #[error("terrace {terrace_id}: {got} points, at least {needed} required")]
    TooFewPoints {
        terrace_id: i64,
        needed: usize,
        got: usize,
    },

    #[error("terrace {terrace_id}: {dropped} rows with non-finite X, Y or Elevation leave {kept}, at least 3 required")]
    NonFinitePoints {
        terrace_id: i64,
        dropped: usize,
        kept: usize,
    },

    #[error("terrace {terrace_id}: plane fit did not converge")]
    FitDidNotConverge { terrace_id: i64 },

    #[error("terrace {terrace_id}: group is empty")]
    EmptyGroup { terrace_id: i64 },

    #[error("terrace {terrace_id}: coincident distances in profile slope")]
    DivisionByZero { terrace_id: i64 },

    #[error("no valid terraces remain ({skipped} skipped)")]
    NoValidTerraces { skipped: usize },
}

impl TerraceError {
    /// The TerraceID a per-group error refers to, if any.
    pub fn terrace_id(&self) -> Option<i64> {
        match self {
            Self::DegeneratePlane { terrace_id }
            | Self::CollinearPoints { terrace_id }
            | Self::TooFewPoints { terrace_id, .. }
            | Self::NonFinitePoints { terrace_id, .. }
            | Self::FitDidNotConverge { terrace_id }
            | Self::EmptyGroup { terrace_id }
            | Self::DivisionByZero { terrace_id } => Some(*terrace_id),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TerraceError>;
