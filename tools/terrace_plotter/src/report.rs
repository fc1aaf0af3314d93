//! CSV reports written next to the input data.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use terrace_core::area::TerraceArea;
use terrace_core::plane::{DipEstimate, DipReport};

pub const DIPS_CSV_SUFFIX: &str = "_terrace_dips.csv";
pub const AREAS_CSV_SUFFIX: &str = "_terrace_areas.csv";

pub fn report_path(data_dir: &Path, prefix: &str, suffix: &str) -> PathBuf {
    data_dir.join(format!("{prefix}{suffix}"))
}

#[derive(Debug, Serialize)]
struct DipRow {
    #[serde(rename = "TerraceID")]
    terrace_id: i64,
    #[serde(rename = "NPoints")]
    n_points: usize,
    #[serde(rename = "A")]
    a: f64,
    #[serde(rename = "B")]
    b: f64,
    #[serde(rename = "C")]
    c: f64,
    #[serde(rename = "DipDeg")]
    dip_deg: f64,
    #[serde(rename = "DipDirectionDeg")]
    dip_direction_deg: f64,
    #[serde(rename = "StrikeDeg")]
    strike_deg: f64,
}

impl From<&DipEstimate> for DipRow {
    fn from(e: &DipEstimate) -> Self {
        Self {
            terrace_id: e.terrace_id,
            n_points: e.n_points,
            a: e.plane.a,
            b: e.plane.b,
            c: e.plane.c,
            dip_deg: e.dip_deg(),
            dip_direction_deg: e.dip_direction_deg(),
            strike_deg: e.strike_deg(),
        }
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write row to {}", path.display()))?;
    }
    writer.flush().with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

pub fn write_dip_csv(path: &Path, estimates: &[DipEstimate]) -> Result<()> {
    write_rows(path, estimates.iter().map(DipRow::from))
}

pub fn write_area_csv(path: &Path, areas: &[TerraceArea]) -> Result<()> {
    write_rows(path, areas)
}

/// JSON array of `{terrace_id, reason}` for terraces the plane fit skipped.
pub fn skipped_summary(report: &DipReport) -> serde_json::Value {
    report
        .skipped
        .iter()
        .map(|s| json!({ "terrace_id": s.terrace_id, "reason": s.reason.to_string() }))
        .collect()
}

pub fn log_skipped(report: &DipReport) {
    if report.skipped.is_empty() {
        return;
    }
    warn!(
        count = report.skipped.len(),
        skipped = %skipped_summary(report),
        "terraces skipped by the plane fit"
    );
}
