//! Tunable parameters for the vertical and horizontal estimators.
//!
//! Every field defaults to the constant the reference sensor-intrinsics
//! implementation hard-codes. Overriding any of them does not change the
//! shape of the output — only how aggressively the estimator searches —
//! so none of the crate's testable invariants depend on these values.

use serde::{Deserialize, Serialize};

/// Parameters governing the Hough accumulator and the vertical fit loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VerticalConfig {
    /// Step size along the dz axis of the Hough grid, in meters.
    pub offset_step: f64,
    /// Step size along the alpha axis of the Hough grid, in radians.
    pub angle_step: f64,
    /// Hard ceiling on dz's search half-width when not bounded by `r_min`.
    pub max_offset: f64,
    /// Outer loop iteration cap (`VERTICAL_MAX_ITER` in the reference implementation).
    pub max_iterations: u64,
    /// Per-peak fit-loop attempt cap before giving up on convergence.
    pub max_fit_attempts: u64,
}

impl Default for VerticalConfig {
    fn default() -> Self {
        Self {
            offset_step: 1e-3,
            angle_step: 1e-4,
            max_offset: 0.5,
            max_iterations: 10_000,
            max_fit_attempts: 10,
        }
    }
}

/// Parameters governing the per-scanline horizontal periodic fit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizontalConfig {
    /// Minimum number of points a scanline needs before it gets a direct
    /// (non-heuristic) horizontal fit.
    pub min_points_per_scanline: usize,
    /// Highest azimuthal resolution considered during the resolution search.
    pub max_resolution: i32,
    /// Hard ceiling on `|dh|` accepted from any candidate fit.
    pub max_offset: f64,
    /// Break threshold on the reciprocal-range axis used when segmenting
    /// points for the segmented-median slope seed.
    pub inv_range_break_threshold: f64,
}

impl Default for HorizontalConfig {
    fn default() -> Self {
        Self {
            min_points_per_scanline: 16,
            max_resolution: 10_000,
            max_offset: 0.5,
            inv_range_break_threshold: 1e-2,
        }
    }
}

/// Full estimator configuration, threaded through
/// [`crate::estimate_intrinsics_detailed`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EstimatorConfig {
    pub vertical: VerticalConfig,
    pub horizontal: HorizontalConfig,
}
