//! Group size filter: keep terraces whose pixel count lies within bounds.
//!
//! Group sizes are computed into a snapshot first and the table is rebuilt in
//! a single pass, so the input is never mutated while its groups are read.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::table::TerraceTable;

/// Inclusive pixel-count bounds for a terrace group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBounds {
    pub min_size: usize,
    pub max_size: usize,
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self { min_size: 5000, max_size: 1_000_000 }
    }
}

impl SizeBounds {
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self { min_size, max_size }
    }

    #[inline]
    pub fn contains(&self, n_pixels: usize) -> bool {
        n_pixels >= self.min_size && n_pixels <= self.max_size
    }
}

/// Result of [`filter_by_size_report`]: the filtered table plus the groups
/// that were dropped, keyed by TerraceID with their pixel counts.
#[derive(Debug, Clone)]
pub struct FilterReport {
    pub table: TerraceTable,
    pub excluded: BTreeMap<i64, usize>,
}

/// Drop every row whose group size falls outside `bounds`. Row order is kept.
pub fn filter_by_size(table: &TerraceTable, bounds: SizeBounds) -> TerraceTable {
    filter_by_size_report(table, bounds).table
}

pub fn filter_by_size_report(table: &TerraceTable, bounds: SizeBounds) -> FilterReport {
    let sizes = table.group_sizes();
    let excluded: BTreeMap<i64, usize> = sizes
        .iter()
        .filter(|(_, &n)| !bounds.contains(n))
        .map(|(&id, &n)| (id, n))
        .collect();

    let points = table
        .points
        .iter()
        .filter(|p| !excluded.contains_key(&p.terrace_id))
        .copied()
        .collect();

    debug!(
        kept = sizes.len() - excluded.len(),
        excluded = excluded.len(),
        "size filter applied"
    );

    FilterReport { table: TerraceTable::new(points), excluded }
}
