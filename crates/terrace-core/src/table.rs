//! CSV loaders for the terrace point table and the channel baseline table.
//!
//! Both files are written by the upstream terrace-extraction tool as
//! `<prefix>_terrace_info.csv` and `<prefix>_baseline_channel_info.csv`, with a
//! header row naming the columns.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TerraceError};

pub const TERRACE_CSV_SUFFIX: &str = "_terrace_info.csv";
pub const CHANNEL_CSV_SUFFIX: &str = "_baseline_channel_info.csv";

/// Elevation written by the upstream tool where the channel has no data.
pub const NODATA_ELEVATION: f64 = -9999.0;

/// One pixel of a terrace, projected onto the channel baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerracePoint {
    #[serde(rename = "TerraceID")]
    pub terrace_id: i64,
    #[serde(rename = "DistAlongBaseline")]
    pub dist_along_baseline: f64,
    #[serde(rename = "DistToBaseline")]
    pub dist_to_baseline: f64,
    #[serde(rename = "Elevation")]
    pub elevation: f64,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

/// One node of the channel baseline. Any further columns in the file are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelPoint {
    #[serde(rename = "DistAlongBaseline")]
    pub dist_along_baseline: f64,
    #[serde(rename = "Elevation")]
    pub elevation: f64,
}

impl ChannelPoint {
    #[inline]
    pub fn is_nodata(&self) -> bool {
        self.elevation == NODATA_ELEVATION
    }
}

/// All terrace pixels, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerraceTable {
    pub points: Vec<TerracePoint>,
}

impl TerraceTable {
    pub fn new(points: Vec<TerracePoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Row count per TerraceID.
    pub fn group_sizes(&self) -> BTreeMap<i64, usize> {
        let mut sizes = BTreeMap::new();
        for p in &self.points {
            *sizes.entry(p.terrace_id).or_insert(0) += 1;
        }
        sizes
    }

    /// Distinct TerraceIDs in ascending order.
    pub fn terrace_ids(&self) -> Vec<i64> {
        self.group_sizes().into_keys().collect()
    }

    /// Points grouped by TerraceID, ascending by ID. Within a group the file
    /// order is kept.
    pub fn groups(&self) -> BTreeMap<i64, Vec<&TerracePoint>> {
        let mut groups: BTreeMap<i64, Vec<&TerracePoint>> = BTreeMap::new();
        for p in &self.points {
            groups.entry(p.terrace_id).or_default().push(p);
        }
        groups
    }

    /// `[X, Y, Elevation]` of every row, grouped like [`Self::groups`].
    pub fn xyz_groups(&self) -> BTreeMap<i64, Vec<[f64; 3]>> {
        let mut groups: BTreeMap<i64, Vec<[f64; 3]>> = BTreeMap::new();
        for p in &self.points {
            groups.entry(p.terrace_id).or_default().push([p.x, p.y, p.elevation]);
        }
        groups
    }
}

/// The channel baseline, in file order, sentinel rows included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelTable {
    pub points: Vec<ChannelPoint>,
}

impl ChannelTable {
    pub fn new(points: Vec<ChannelPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rows whose elevation is not the no-data sentinel.
    pub fn valid_points(&self) -> impl Iterator<Item = &ChannelPoint> {
        self.points.iter().filter(|p| !p.is_nodata())
    }

    /// Copy of the table with every sentinel row removed.
    pub fn without_nodata(&self) -> ChannelTable {
        ChannelTable::new(self.valid_points().copied().collect())
    }
}

pub fn terrace_csv_path(data_dir: &Path, prefix: &str) -> PathBuf {
    data_dir.join(format!("{prefix}{TERRACE_CSV_SUFFIX}"))
}

pub fn channel_csv_path(data_dir: &Path, prefix: &str) -> PathBuf {
    data_dir.join(format!("{prefix}{CHANNEL_CSV_SUFFIX}"))
}

/// Read `<data_dir>/<prefix>_terrace_info.csv`.
pub fn read_terrace_csv(data_dir: &Path, prefix: &str) -> Result<TerraceTable> {
    let path = terrace_csv_path(data_dir, prefix);
    let points = read_rows(&path)?;
    debug!(path = %path.display(), rows = points.len(), "read terrace table");
    Ok(TerraceTable::new(points))
}

/// Read `<data_dir>/<prefix>_baseline_channel_info.csv`.
pub fn read_channel_csv(data_dir: &Path, prefix: &str) -> Result<ChannelTable> {
    let path = channel_csv_path(data_dir, prefix);
    let points = read_rows(&path)?;
    debug!(path = %path.display(), rows = points.len(), "read channel table");
    Ok(ChannelTable::new(points))
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.is_file() {
        return Err(TerraceError::FileNotFound { path: path.to_path_buf() });
    }
    let parse_err = |source| TerraceError::Parse { path: path.to_path_buf(), source };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(parse_err)?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()
        .map_err(parse_err)
}
