//! Least-squares plane fit and strike/dip estimation for terrace surfaces.
//!
//! Each terrace is modelled as `Elevation ≈ a·X + b·Y + c`. From the fitted
//! coefficients:
//!
//!   dip_slope   = √(a² + b²)
//!   dip_angle   = atan(dip_slope)
//!   θ±          = acos(a / dip_slope)
//!
//! The sign of θ± is chosen by comparing `round(dip_angle · cos θ±, 6)` with
//! `round(a, 6)` (half-to-even). The resulting orientation is flipped by π
//! whenever the plane rises along it, so the dip direction always points
//! downslope. Strike is the dip direction rotated by −π/2 (right-hand rule).
//! Angles are radians; dip direction and strike are normalised to [0, 2π).
use std::borrow::Cow;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, TerraceError};
use crate::table::TerraceTable;

/// Slopes below this are treated as a horizontal plane.
const HORIZONTAL_SLOPE_EPS: f64 = 1e-12;
/// Smallest-to-largest singular value ratio below which the design matrix is
/// considered rank deficient.
const RANK_TOLERANCE: f64 = 1e-10;
/// Decimal places used by the orientation sign test.
const SIGN_TEST_DECIMALS: i32 = 6;
/// Sweep limit for the SVD of the design matrix.
const SVD_MAX_ITERATIONS: usize = 1000;

/// Coefficients of `z = a·x + b·y + c`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaneCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl PlaneCoefficients {
    #[inline]
    pub fn elevation_at(&self, x: f64, y: f64) -> f64 {
        self.a * x + self.b * y + self.c
    }
}

/// Orientation of a fitted plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DipAngles {
    /// √(a² + b²), rise over run along the steepest line.
    pub dip_slope: f64,
    /// atan(dip_slope), radians.
    pub dip_angle: f64,
    /// Downslope azimuth in radians, counter-clockwise from +X, in [0, 2π).
    pub dip_direction: f64,
    /// Sign picked by the orientation test: +1 or −1.
    pub orientation_sign: i8,
    /// Dip direction − π/2, in [0, 2π).
    pub strike: f64,
}

/// Plane fit and orientation for one terrace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DipEstimate {
    pub terrace_id: i64,
    pub n_points: usize,
    pub plane: PlaneCoefficients,
    pub angles: DipAngles,
    /// Mean (x, y, z) of the fitted points.
    pub centroid: [f64; 3],
}

impl DipEstimate {
    pub fn dip_deg(&self) -> f64 {
        self.angles.dip_angle.to_degrees()
    }

    pub fn dip_direction_deg(&self) -> f64 {
        self.angles.dip_direction.to_degrees()
    }

    pub fn strike_deg(&self) -> f64 {
        self.angles.strike.to_degrees()
    }
}

/// A terrace that could not be fitted, with the reason.
#[derive(Debug)]
pub struct SkippedTerrace {
    pub terrace_id: i64,
    pub reason: TerraceError,
}

/// Outcome of fitting every terrace in a table.
#[derive(Debug, Default)]
pub struct DipReport {
    /// Successful fits, ascending by TerraceID.
    pub estimates: Vec<DipEstimate>,
    pub skipped: Vec<SkippedTerrace>,
}

/// Round half-to-even at `decimals` places.
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Wrap an angle into [0, 2π). `rem_euclid` can round up to exactly 2π for
/// tiny negative inputs.
fn normalize_azimuth(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// `points` without rows holding a NaN or infinite coordinate, provided at
/// least three remain.
fn finite_rows(terrace_id: i64, points: &[[f64; 3]]) -> Result<Cow<'_, [[f64; 3]]>> {
    if points.is_empty() {
        return Err(TerraceError::EmptyGroup { terrace_id });
    }
    let is_finite = |p: &[f64; 3]| p.iter().all(|v| v.is_finite());
    let rows: Cow<'_, [[f64; 3]]> = if points.iter().all(is_finite) {
        Cow::Borrowed(points)
    } else {
        Cow::Owned(points.iter().copied().filter(is_finite).collect())
    };

    let dropped = points.len() - rows.len();
    if rows.len() < 3 {
        return Err(if dropped > 0 {
            TerraceError::NonFinitePoints { terrace_id, dropped, kept: rows.len() }
        } else {
            TerraceError::TooFewPoints { terrace_id, needed: 3, got: rows.len() }
        });
    }
    if dropped > 0 {
        warn!(terrace_id, dropped, "ignoring rows with non-finite coordinates");
    }
    Ok(rows)
}

/// Least-squares fit of `z = a·x + b·y + c` to `points` given as `[x, y, z]`.
/// Rows with a non-finite coordinate are left out of the fit.
pub fn fit_plane(terrace_id: i64, points: &[[f64; 3]]) -> Result<PlaneCoefficients> {
    let rows = finite_rows(terrace_id, points)?;
    solve_plane(terrace_id, &rows)
}

/// x and y are centred before solving; large projected coordinates would
/// otherwise swamp the intercept column. `points` must be finite.
fn solve_plane(terrace_id: i64, points: &[[f64; 3]]) -> Result<PlaneCoefficients> {
    let n = points.len();
    let [mx, my, _] = centroid(points);
    let design = DMatrix::<f64>::from_fn(n, 3, |r, c| match c {
        0 => points[r][0] - mx,
        1 => points[r][1] - my,
        _ => 1.0,
    });
    let z = DVector::<f64>::from_iterator(n, points.iter().map(|p| p[2]));

    let svd = design
        .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or(TerraceError::FitDidNotConverge { terrace_id })?;
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    if !(s_max > 0.0) || s_min <= s_max * RANK_TOLERANCE {
        return Err(TerraceError::CollinearPoints { terrace_id });
    }
    let coeffs = svd
        .solve(&z, 0.0)
        .map_err(|_| TerraceError::CollinearPoints { terrace_id })?;

    let (a, b, c_centred) = (coeffs[0], coeffs[1], coeffs[2]);
    Ok(PlaneCoefficients { a, b, c: c_centred - a * mx - b * my })
}

/// Dip slope, dip angle, dip direction and strike of a fitted plane.
pub fn dip_angles(terrace_id: i64, plane: &PlaneCoefficients) -> Result<DipAngles> {
    let PlaneCoefficients { a, b, .. } = *plane;

    let dip_slope = (a * a + b * b).sqrt();
    if !(dip_slope > HORIZONTAL_SLOPE_EPS) {
        return Err(TerraceError::DegeneratePlane { terrace_id });
    }
    let dip_angle = dip_slope.atan();

    // Orientation is ±θ; acos alone cannot tell the two apart.
    let theta_pm = (a / dip_slope).clamp(-1.0, 1.0).acos();
    let is_plus = round_to(dip_angle * theta_pm.cos(), SIGN_TEST_DECIMALS)
        == round_to(a, SIGN_TEST_DECIMALS);
    let orientation_sign: i8 = if is_plus { 1 } else { -1 };
    let dip_orientation = f64::from(orientation_sign) * theta_pm;

    // Dips go downslope: flip when the plane rises along the orientation.
    let slope = a * dip_orientation.cos() + b * dip_orientation.sin();
    let dip_direction = if slope > 0.0 {
        dip_orientation + PI
    } else {
        dip_orientation
    };

    Ok(DipAngles {
        dip_slope,
        dip_angle,
        dip_direction: normalize_azimuth(dip_direction),
        orientation_sign,
        strike: normalize_azimuth(dip_direction - FRAC_PI_2),
    })
}

/// Fit a plane to one terrace and derive its orientation.
pub fn estimate_dip(terrace_id: i64, points: &[[f64; 3]]) -> Result<DipEstimate> {
    let rows = finite_rows(terrace_id, points)?;
    let plane = solve_plane(terrace_id, &rows)?;
    let angles = dip_angles(terrace_id, &plane)?;
    Ok(DipEstimate {
        terrace_id,
        n_points: rows.len(),
        plane,
        angles,
        centroid: centroid(&rows),
    })
}

/// Fit every terrace group in `table` independently.
///
/// A group that cannot be fitted is recorded in [`DipReport::skipped`] and
/// does not affect the others. Returns `NoValidTerraces` when no group fits.
pub fn estimate_dips(table: &TerraceTable) -> Result<DipReport> {
    let groups: Vec<(i64, Vec<[f64; 3]>)> = table.xyz_groups().into_iter().collect();

    #[cfg(feature = "threading")]
    let results: Vec<(i64, Result<DipEstimate>)> = {
        use rayon::prelude::*;
        groups
            .into_par_iter()
            .map(|(id, pts)| (id, estimate_dip(id, &pts)))
            .collect()
    };
    #[cfg(not(feature = "threading"))]
    let results: Vec<(i64, Result<DipEstimate>)> = groups
        .into_iter()
        .map(|(id, pts)| (id, estimate_dip(id, &pts)))
        .collect();

    let mut report = DipReport::default();
    for (terrace_id, result) in results {
        match result {
            Ok(est) => {
                debug!(
                    terrace_id,
                    dip_deg = est.dip_deg(),
                    dip_direction_deg = est.dip_direction_deg(),
                    "plane fitted"
                );
                report.estimates.push(est);
            }
            Err(reason) => {
                warn!(terrace_id, %reason, "skipping terrace");
                report.skipped.push(SkippedTerrace { terrace_id, reason });
            }
        }
    }

    if report.estimates.is_empty() {
        return Err(TerraceError::NoValidTerraces { skipped: report.skipped.len() });
    }
    info!(
        fitted = report.estimates.len(),
        skipped = report.skipped.len(),
        "terrace dips estimated"
    );
    Ok(report)
}

fn centroid(points: &[[f64; 3]]) -> [f64; 3] {
    let n = points.len().max(1) as f64;
    let mut sum = [0.0f64; 3];
    for p in points {
        sum[0] += p[0];
        sum[1] += p[1];
        sum[2] += p[2];
    }
    [sum[0] / n, sum[1] / n, sum[2] / n]
}
