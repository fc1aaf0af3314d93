//! Longitudinal profiles: terrace tread envelopes and the channel baseline.
//!
//! A terrace profile keeps, for each distinct `DistAlongBaseline`, the lowest
//! elevation observed there. A terrace is accepted when it has more than
//! `min_points` rows, between 2 and `max_distinct - 1` distinct distances, and
//! a mean consecutive gradient below `max_mean_slope`.
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TerraceError};
use crate::table::{ChannelTable, TerraceTable};

/// Acceptance thresholds for terrace profiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileFilter {
    /// Raw row count must be strictly greater than this.
    pub min_points: usize,
    /// Distinct distance count must be strictly less than this (and above 1).
    pub max_distinct: usize,
    /// Mean of Δz/Δx must be strictly less than this.
    pub max_mean_slope: f64,
}

impl Default for ProfileFilter {
    fn default() -> Self {
        Self { min_points: 50, max_distinct: 1000, max_mean_slope: 10.0 }
    }
}

/// Lower-envelope profile of one terrace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerraceProfile {
    pub terrace_id: i64,
    /// Distinct distances along the baseline, ascending.
    pub distance: Vec<f64>,
    /// Minimum elevation at each distance.
    pub elevation: Vec<f64>,
}

/// Why a terrace was left out of the profile set.
#[derive(Debug)]
pub enum Rejection {
    TooFewPoints { count: usize },
    DistinctDistances { count: usize },
    MeanSlope { mean_slope: f64 },
    Invalid(TerraceError),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewPoints { count } => write!(f, "only {count} points"),
            Self::DistinctDistances { count } => {
                write!(f, "{count} distinct distances along baseline")
            }
            Self::MeanSlope { mean_slope } => write!(f, "mean slope {mean_slope:.3} too steep"),
            Self::Invalid(err) => write!(f, "{err}"),
        }
    }
}

/// Accepted profiles in ascending TerraceID order, plus the rejected IDs.
#[derive(Debug, Default)]
pub struct ProfileSet {
    pub profiles: Vec<TerraceProfile>,
    pub rejected: Vec<(i64, Rejection)>,
}

impl ProfileSet {
    pub fn ids(&self) -> Vec<i64> {
        self.profiles.iter().map(|p| p.terrace_id).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// (min, max) over every profile, as `((x_min, x_max), (z_min, z_max))`.
    pub fn extent(&self) -> Option<((f64, f64), (f64, f64))> {
        let xs = self.profiles.iter().flat_map(|p| p.distance.iter().copied());
        let zs = self.profiles.iter().flat_map(|p| p.elevation.iter().copied());
        Some((min_max(xs)?, min_max(zs)?))
    }
}

/// Distinct sorted distances and the minimum elevation at each.
/// Rows with a non-finite distance or elevation are ignored.
pub fn lower_envelope(points: &[(f64, f64)]) -> (Vec<f64>, Vec<f64>) {
    let mut sorted: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, z)| x.is_finite() && z.is_finite())
        .collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut distance: Vec<f64> = Vec::new();
    let mut elevation: Vec<f64> = Vec::new();
    for (x, z) in sorted {
        if distance.last() == Some(&x) {
            if let Some(lowest) = elevation.last_mut() {
                *lowest = lowest.min(z);
            }
        } else {
            distance.push(x);
            elevation.push(z);
        }
    }
    (distance, elevation)
}

/// Mean of the consecutive gradients Δz/Δx.
///
/// A zero or non-finite Δx yields `DivisionByZero` rather than an infinite mean.
pub fn mean_gradient(terrace_id: i64, distance: &[f64], elevation: &[f64]) -> Result<f64> {
    let n = distance.len().min(elevation.len());
    if n < 2 {
        return Err(TerraceError::TooFewPoints { terrace_id, needed: 2, got: n });
    }
    let mut sum = 0.0f64;
    for i in 1..n {
        let dx = distance[i] - distance[i - 1];
        if dx == 0.0 || !dx.is_finite() {
            return Err(TerraceError::DivisionByZero { terrace_id });
        }
        sum += (elevation[i] - elevation[i - 1]) / dx;
    }
    Ok(sum / (n - 1) as f64)
}

/// Build and vet the profile of one terrace from its
/// `(DistAlongBaseline, Elevation)` pairs.
pub fn extract_profile(
    terrace_id: i64,
    points: &[(f64, f64)],
    filter: &ProfileFilter,
) -> std::result::Result<TerraceProfile, Rejection> {
    if points.is_empty() {
        return Err(Rejection::Invalid(TerraceError::EmptyGroup { terrace_id }));
    }
    if points.len() <= filter.min_points {
        return Err(Rejection::TooFewPoints { count: points.len() });
    }

    let (distance, elevation) = lower_envelope(points);
    if distance.len() <= 1 || distance.len() >= filter.max_distinct {
        return Err(Rejection::DistinctDistances { count: distance.len() });
    }

    let mean_slope = mean_gradient(terrace_id, &distance, &elevation).map_err(Rejection::Invalid)?;
    if !(mean_slope < filter.max_mean_slope) {
        return Err(Rejection::MeanSlope { mean_slope });
    }

    Ok(TerraceProfile { terrace_id, distance, elevation })
}

/// Profiles for every terrace in `table`, in ascending TerraceID order.
pub fn extract_profiles(table: &TerraceTable, filter: &ProfileFilter) -> ProfileSet {
    let mut set = ProfileSet::default();
    for (terrace_id, group) in table.groups() {
        let pairs: Vec<(f64, f64)> =
            group.iter().map(|p| (p.dist_along_baseline, p.elevation)).collect();
        match extract_profile(terrace_id, &pairs, filter) {
            Ok(profile) => set.profiles.push(profile),
            Err(reason) => {
                debug!(terrace_id, %reason, "terrace profile rejected");
                set.rejected.push((terrace_id, reason));
            }
        }
    }
    info!(
        accepted = set.profiles.len(),
        rejected = set.rejected.len(),
        "terrace profiles extracted"
    );
    set
}

/// The channel baseline as a polyline, sentinel rows removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelProfile {
    pub distance: Vec<f64>,
    pub elevation: Vec<f64>,
}

impl ChannelProfile {
    /// Valid rows ordered by distance; rows sharing a distance keep file order.
    /// Rows with a non-finite distance or elevation are dropped.
    pub fn from_table(table: &ChannelTable) -> Self {
        let mut rows: Vec<(f64, f64)> = table
            .valid_points()
            .map(|p| (p.dist_along_baseline, p.elevation))
            .filter(|(x, z)| x.is_finite() && z.is_finite())
            .collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (distance, elevation) = rows.into_iter().unzip();
        Self { distance, elevation }
    }

    /// One node per distinct distance, elevation averaged over the valid rows
    /// sharing it.
    pub fn mean_from_table(table: &ChannelTable) -> Self {
        let full = Self::from_table(table);
        let mut out = Self::default();
        let mut i = 0;
        while i < full.distance.len() {
            let x = full.distance[i];
            let mut j = i;
            let mut sum = 0.0;
            while j < full.distance.len() && full.distance[j] == x {
                sum += full.elevation[j];
                j += 1;
            }
            out.distance.push(x);
            out.elevation.push(sum / (j - i) as f64);
            i = j;
        }
        out
    }

    pub fn len(&self) -> usize {
        self.distance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.distance.iter().copied().zip(self.elevation.iter().copied())
    }

    /// `((x_min, x_max), (z_min, z_max))`, `None` when empty.
    pub fn extent(&self) -> Option<((f64, f64), (f64, f64))> {
        Some((
            min_max(self.distance.iter().copied())?,
            min_max(self.elevation.iter().copied())?,
        ))
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ChannelPoint, TerracePoint, NODATA_ELEVATION};
    use approx::assert_abs_diff_eq;

    /// `n_rows` rows spread over `n_distinct` distances 10 m apart; elevation
    /// rises with `slope`, plus a per-row bump so the envelope must pick the min.
    fn ramp_rows(n_rows: usize, n_distinct: usize, slope: f64) -> Vec<(f64, f64)> {
        (0..n_rows)
            .map(|i| {
                let k = i % n_distinct;
                let x = k as f64 * 10.0;
                let bump = (i / n_distinct) as f64 * 0.5;
                (x, 100.0 + slope * x + bump)
            })
            .collect()
    }

    #[test]
    fn sixty_rows_five_distances_slope_two_is_accepted() {
        let rows = ramp_rows(60, 5, 2.0);
        let profile = extract_profile(1, &rows, &ProfileFilter::default()).unwrap();
        assert_eq!(profile.distance, vec![0.0, 10.0, 20.0, 30.0, 40.0]);
        assert_eq!(profile.elevation, vec![100.0, 120.0, 140.0, 160.0, 180.0]);
        let mean = mean_gradient(1, &profile.distance, &profile.elevation).unwrap();
        assert_abs_diff_eq!(mean, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn fifty_rows_is_too_few() {
        let rows = ramp_rows(50, 5, 2.0);
        let err = extract_profile(1, &rows, &ProfileFilter::default()).unwrap_err();
        assert!(matches!(err, Rejection::TooFewPoints { count: 50 }));
    }

    #[test]
    fn single_distance_is_rejected() {
        let rows = ramp_rows(80, 1, 0.0);
        let err = extract_profile(1, &rows, &ProfileFilter::default()).unwrap_err();
        assert!(matches!(err, Rejection::DistinctDistances { count: 1 }));
    }

    #[test]
    fn thousand_distances_is_rejected() {
        let rows = ramp_rows(2000, 1000, 0.1);
        let err = extract_profile(1, &rows, &ProfileFilter::default()).unwrap_err();
        assert!(matches!(err, Rejection::DistinctDistances { count: 1000 }));
        let rows = ramp_rows(2000, 999, 0.1);
        assert!(extract_profile(1, &rows, &ProfileFilter::default()).is_ok());
    }

    #[test]
    fn steep_profile_is_rejected() {
        let rows = ramp_rows(60, 5, 10.0);
        let err = extract_profile(1, &rows, &ProfileFilter::default()).unwrap_err();
        match err {
            Rejection::MeanSlope { mean_slope } => assert_abs_diff_eq!(mean_slope, 10.0, epsilon = 1e-9),
            other => panic!("expected MeanSlope, got {other:?}"),
        }
        // Steep descent is fine: only the signed mean is bounded.
        assert!(extract_profile(1, &ramp_rows(60, 5, -40.0), &ProfileFilter::default()).is_ok());
    }

    #[test]
    fn coincident_distances_are_division_by_zero() {
        let err = mean_gradient(5, &[1.0, 1.0, 2.0], &[0.0, 1.0, 2.0]).unwrap_err();
        assert!(matches!(err, TerraceError::DivisionByZero { terrace_id: 5 }));
    }

    #[test]
    fn envelope_merges_signed_zero_and_skips_nan() {
        let (x, z) = lower_envelope(&[(0.0, 5.0), (-0.0, 3.0), (1.0, f64::NAN), (1.0, 7.0)]);
        assert_eq!(x.len(), 2);
        assert_eq!(z, vec![3.0, 7.0]);
    }

    #[test]
    fn profiles_follow_ascending_ids() {
        let mut points = Vec::new();
        for &(id, slope) in &[(9i64, 1.0), (4, 50.0), (2, 0.5)] {
            for (x, z) in ramp_rows(60, 6, slope) {
                points.push(TerracePoint {
                    terrace_id: id,
                    dist_along_baseline: x,
                    dist_to_baseline: 0.0,
                    elevation: z,
                    x: 0.0,
                    y: 0.0,
                });
            }
        }
        let set = extract_profiles(&TerraceTable::new(points), &ProfileFilter::default());
        assert_eq!(set.ids(), vec![2, 9]);
        assert_eq!(set.rejected.len(), 1);
        assert_eq!(set.rejected[0].0, 4);
        let ((x0, x1), (z0, _)) = set.extent().unwrap();
        assert_eq!((x0, x1), (0.0, 50.0));
        assert_eq!(z0, 100.0);
    }

    #[test]
    fn channel_profile_drops_sentinel_rows() {
        let table = ChannelTable::new(vec![
            ChannelPoint { dist_along_baseline: 20.0, elevation: 410.0 },
            ChannelPoint { dist_along_baseline: 10.0, elevation: NODATA_ELEVATION },
            ChannelPoint { dist_along_baseline: 0.0, elevation: 400.0 },
            ChannelPoint { dist_along_baseline: 20.0, elevation: 412.0 },
        ]);
        let profile = ChannelProfile::from_table(&table);
        assert_eq!(profile.distance, vec![0.0, 20.0, 20.0]);
        assert!(profile.elevation.iter().all(|&z| z != NODATA_ELEVATION));

        let mean = ChannelProfile::mean_from_table(&table);
        assert_eq!(mean.distance, vec![0.0, 20.0]);
        assert_eq!(mean.elevation, vec![400.0, 411.0]);
        assert_eq!(mean.extent(), Some(((0.0, 20.0), (400.0, 411.0))));
    }

    #[test]
    fn channel_profile_drops_nan_rows_and_stays_sorted() {
        let table = ChannelTable::new(vec![
            ChannelPoint { dist_along_baseline: 30.0, elevation: 415.0 },
            ChannelPoint { dist_along_baseline: f64::NAN, elevation: 401.0 },
            ChannelPoint { dist_along_baseline: 10.0, elevation: 405.0 },
            ChannelPoint { dist_along_baseline: 20.0, elevation: f64::NAN },
            ChannelPoint { dist_along_baseline: 0.0, elevation: 400.0 },
            ChannelPoint { dist_along_baseline: f64::INFINITY, elevation: 420.0 },
        ]);
        let profile = ChannelProfile::from_table(&table);
        assert_eq!(profile.distance, vec![0.0, 10.0, 30.0]);
        assert_eq!(profile.elevation, vec![400.0, 405.0, 415.0]);

        let mean = ChannelProfile::mean_from_table(&table);
        assert_eq!(mean.distance, vec![0.0, 10.0, 30.0]);
        assert!(ChannelProfile::default().extent().is_none());
    }
}
