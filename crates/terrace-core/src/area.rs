//! Planimetric terrace areas: pixel count times cell area.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::raster::EnviRaster;
use crate::table::TerraceTable;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TerraceArea {
    #[serde(rename = "TerraceID")]
    pub terrace_id: i64,
    #[serde(rename = "PixelCount")]
    pub pixel_count: usize,
    #[serde(rename = "AreaM2")]
    pub area_m2: f64,
}

/// Area of each terrace in `table`, ascending by TerraceID.
pub fn terrace_areas(table: &TerraceTable, cell_area_m2: f64) -> Vec<TerraceArea> {
    table
        .group_sizes()
        .into_iter()
        .map(|(terrace_id, pixel_count)| TerraceArea {
            terrace_id,
            pixel_count,
            area_m2: pixel_count as f64 * cell_area_m2,
        })
        .collect()
}

/// Pixel count per terrace in a TerraceID raster. NaN cells and non-positive
/// IDs are background.
pub fn pixel_counts(raster: &EnviRaster) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &v in &raster.data {
        if v.is_finite() && v > 0.0 {
            *counts.entry(v.round() as i64).or_insert(0) += 1;
        }
    }
    counts
}

/// Cell area of a TerraceID raster, falling back to `default_cell_area`
/// when the header carries no `map info`.
pub fn raster_cell_area(raster: &EnviRaster, default_cell_area: f64) -> f64 {
    raster.cell_area().unwrap_or(default_cell_area)
}
