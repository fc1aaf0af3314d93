//! Stage orchestration: load → size filter → profiles | plane fits.
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TerraceError};
use crate::filter::{filter_by_size_report, SizeBounds};
use crate::plane::{estimate_dips, DipReport};
use crate::profile::{extract_profiles, ChannelProfile, ProfileFilter, ProfileSet};
use crate::table::{read_channel_csv, read_terrace_csv, TerraceTable};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Inputs shared by every analysis entry point. Nothing is read from disk
/// until one of the entry points runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub data_dir: PathBuf,
    /// DEM name; every input file starts with it.
    pub prefix: String,
    pub size_bounds: SizeBounds,
    pub profile_filter: ProfileFilter,
    /// Average channel elevations that share a distance into one node.
    #[serde(default)]
    pub mean_channel: bool,
}

impl AnalysisConfig {
    pub fn new(data_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            prefix: prefix.into(),
            size_bounds: SizeBounds::default(),
            profile_filter: ProfileFilter::default(),
            mean_channel: false,
        }
    }
}

// ── Outputs ───────────────────────────────────────────────────────────────────

/// Everything the long-profile figure needs.
#[derive(Debug)]
pub struct LongProfileData {
    pub channel: ChannelProfile,
    pub profiles: ProfileSet,
    /// Terraces dropped by the size filter, with their pixel counts.
    pub excluded_by_size: BTreeMap<i64, usize>,
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Terrace table with the size filter applied. Every excluded TerraceID is
/// logged with its pixel count.
pub fn filtered_terraces(config: &AnalysisConfig) -> Result<(TerraceTable, BTreeMap<i64, usize>)> {
    let raw = read_terrace_csv(&config.data_dir, &config.prefix)?;
    let report = filter_by_size_report(&raw, config.size_bounds);
    let SizeBounds { min_size, max_size } = config.size_bounds;
    for (&terrace_id, &pixels) in &report.excluded {
        info!(terrace_id, pixels, min_size, max_size, "terrace excluded by size");
    }
    info!(
        rows = raw.len(),
        kept_rows = report.table.len(),
        excluded_terraces = report.excluded.len(),
        "terrace table loaded"
    );
    Ok((report.table, report.excluded))
}

/// Accepted terrace profiles. Fails with `NoValidTerraces` when none pass.
pub fn terrace_profiles(config: &AnalysisConfig) -> Result<(ProfileSet, BTreeMap<i64, usize>)> {
    let (terraces, excluded) = filtered_terraces(config)?;
    let profiles = extract_profiles(&terraces, &config.profile_filter);
    for (terrace_id, reason) in &profiles.rejected {
        warn!(terrace_id, %reason, "terrace left out of profile plot");
    }
    if profiles.is_empty() {
        return Err(TerraceError::NoValidTerraces {
            skipped: excluded.len() + profiles.rejected.len(),
        });
    }
    Ok((profiles, excluded))
}

/// Terrace profiles plus the channel baseline, sentinel rows removed. With
/// `mean_channel` set, channel rows sharing a distance are averaged.
pub fn long_profile(config: &AnalysisConfig) -> Result<LongProfileData> {
    let (profiles, excluded_by_size) = terrace_profiles(config)?;
    let channel_table = read_channel_csv(&config.data_dir, &config.prefix)?;
    let channel = if config.mean_channel {
        ChannelProfile::mean_from_table(&channel_table)
    } else {
        ChannelProfile::from_table(&channel_table)
    };
    info!(
        channel_nodes = channel.len(),
        input_rows = channel_table.len(),
        mean = config.mean_channel,
        "channel baseline loaded"
    );
    Ok(LongProfileData { channel, profiles, excluded_by_size })
}

/// Plane fit, dip and strike of every terrace that passes the size filter.
pub fn terrace_dips(config: &AnalysisConfig) -> Result<DipReport> {
    terrace_dips_with_table(config).map(|(report, _)| report)
}

/// As [`terrace_dips`], also returning the filtered table the planes were
/// fitted to.
pub fn terrace_dips_with_table(config: &AnalysisConfig) -> Result<(DipReport, TerraceTable)> {
    let (terraces, excluded) = filtered_terraces(config)?;
    if terraces.is_empty() {
        return Err(TerraceError::NoValidTerraces { skipped: excluded.len() });
    }
    let report = estimate_dips(&terraces)?;
    Ok((report, terraces))
}
