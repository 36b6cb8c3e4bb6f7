//! HorizontalEstimator — per-scanline periodic fit recovering the
//! horizontal offset `dh`, azimuthal phase `phi0`, and integer resolution
//! `R` (design doc §4.7).

use crate::config::HorizontalConfig;
use crate::math::{circular_mean, ols_fit, weighted_median};
use crate::point::PointArray;

/// Result of fitting one scanline's azimuthal geometry.
#[derive(Debug, Clone, Copy)]
pub struct HorizontalFit {
    pub dh: f64,
    pub phi0: f64,
    pub resolution: i32,
    pub heuristic: bool,
}

/// Sawtooth residual of `theta` against the nearest multiple of `step`,
/// landing in `(-step/2, step/2]`.
fn diff_to_ideal(theta: f64, step: f64) -> f64 {
    theta - (theta / step).round() * step
}

/// Unwraps the sawtooth `diff_to_ideal` signal by subtracting a running
/// correction wherever consecutive samples jump by more than half a period
/// — produces a signal linear in `x` suitable for segment regression.
fn reconstruct(diffs: &[f64], step: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(diffs.len());
    if diffs.is_empty() {
        return out;
    }
    out.push(diffs[0]);
    let mut correction = 0.0;
    for i in 1..diffs.len() {
        let delta = diffs[i] - diffs[i - 1];
        if delta.abs() >= step / 2.0 {
            correction -= step * delta.signum();
        }
        out.push(diffs[i] + correction);
    }
    out
}

/// Segments `(x, y)` wherever the x- or y-axis break thresholds are
/// exceeded, fits an OLS line to every segment of at least 3 points with a
/// finite, in-range slope, and returns the weighted median of the segment
/// slopes as the seed `dh` guess for the periodic fit.
///
/// The segment intercepts (mod period) have a weighted median too, but it
/// is never used downstream: `periodic_fit` seeds its intercept at 0 and
/// recovers the true phase itself via the circular mean, so only the slope
/// guess is worth returning here.
fn segmented_median_slope(x: &[f64], y: &[f64], x_break: f64, y_break: f64, max_offset: f64) -> Option<f64> {
    let n = x.len();
    if n < 3 {
        return None;
    }

    let mut slopes = Vec::new();
    let mut weights = Vec::new();
    let mut start = 0;
    for i in 1..=n {
        let is_break = i == n || (x[i] - x[i - 1]).abs() >= x_break || (y[i] - y[i - 1]).abs() >= y_break;
        if is_break {
            let seg_len = i - start;
            if seg_len >= 3 {
                if let Some(fit) = ols_fit(&x[start..i], &y[start..i]) {
                    if fit.slope.is_finite() && fit.slope.abs() <= max_offset {
                        slopes.push(fit.slope);
                        weights.push(seg_len as f64);
                    }
                }
            }
            start = i;
        }
    }

    weighted_median(&slopes, &weights)
}

/// Fits the periodic model `theta ~= dh*x + phi0 (mod period)` given a
/// slope seed, returning `(dh, phi0, mse)`.
fn periodic_fit(x: &[f64], theta: &[f64], period: f64, slope_guess: f64) -> Option<(f64, f64, f64)> {
    let n = x.len();
    if n < 2 {
        return None;
    }
    let y: Vec<f64> = theta.iter().map(|&t| diff_to_ideal(t, period)).collect();

    let r: Vec<f64> = (0..n).map(|i| y[i] - slope_guess * x[i]).collect();
    let residuals_mod: Vec<f64> = r.iter().map(|&ri| ri - (ri / period).round() * period).collect();
    let phi0c = circular_mean(&residuals_mod, period);

    let k: Vec<f64> = (0..n).map(|i| ((y[i] - slope_guess * x[i] - phi0c) / period).round()).collect();
    let y_tilde: Vec<f64> = (0..n).map(|i| y[i] - k[i] * period).collect();

    let mid = n / 2;
    let first_half = ols_fit(&x[..mid.max(1)], &y_tilde[..mid.max(1)]);
    let second_half = ols_fit(&x[mid.max(1)..], &y_tilde[mid.max(1)..]);
    let fit_all = ols_fit(x, &y_tilde)?;

    let fit_half = match (first_half, second_half) {
        (Some(a), Some(b)) => {
            if a.mse <= b.mse {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => fit_all,
    };

    let k2: Vec<f64> = (0..n).map(|i| ((y[i] - fit_half.slope * x[i] - fit_half.intercept) / period).round()).collect();
    let y_tilde2: Vec<f64> = (0..n).map(|i| y[i] - k2[i] * period).collect();
    let fit_final = ols_fit(x, &y_tilde2)?;

    let best = if fit_all.mse <= fit_final.mse { fit_all } else { fit_final };

    Some((best.slope, best.intercept.rem_euclid(period), best.mse))
}

/// Direct (non-heuristic) fit: searches integer resolutions from
/// `|indices|` up to `config.max_resolution`, minimizing `mse * R^2`.
pub fn fit_direct(points: &PointArray, indices: &[usize], config: &HorizontalConfig) -> Option<HorizontalFit> {
    if indices.len() < config.min_points_per_scanline {
        return None;
    }

    let mut sorted: Vec<usize> = indices.to_vec();
    sorted.sort_by(|&a, &b| points.inv_range_xy()[a].partial_cmp(&points.inv_range_xy()[b]).unwrap_or(std::cmp::Ordering::Equal));

    let x: Vec<f64> = sorted.iter().map(|&p| points.inv_range_xy()[p]).collect();
    let theta: Vec<f64> = sorted.iter().map(|&p| points.theta()[p]).collect();

    let mut best: Option<(i32, f64, f64, f64)> = None; // (R, dh, phi0, loss)

    let r_min = sorted.len().max(1) as i32;
    for resolution in r_min..=config.max_resolution {
        let step = std::f64::consts::TAU / resolution as f64;
        let diffs: Vec<f64> = theta.iter().map(|&t| diff_to_ideal(t, step)).collect();
        let reconstructed = reconstruct(&diffs, step);

        let Some(slope_guess) = segmented_median_slope(&x, &reconstructed, config.inv_range_break_threshold, step / 4.0, config.max_offset) else {
            continue;
        };

        let Some((dh, phi0, mse)) = periodic_fit(&x, &theta, step, slope_guess) else {
            continue;
        };
        if !dh.is_finite() || dh.abs() > config.max_offset {
            continue;
        }

        let loss = mse * (resolution as f64).powi(2);
        if best.map(|(_, _, _, l)| loss < l).unwrap_or(true) {
            best = Some((resolution, dh, phi0, loss));
        }
    }

    best.map(|(resolution, dh, phi0, _)| HorizontalFit { dh, phi0, resolution, heuristic: false })
}

/// Borrows `(R, dh)` from already-fit scanlines for one with too few points
/// to fit directly, minimizing the mean alignment residual against each
/// candidate grid.
pub fn fit_heuristic(points: &PointArray, indices: &[usize], already_fit: &[HorizontalFit]) -> Option<HorizontalFit> {
    if indices.is_empty() || already_fit.is_empty() {
        return None;
    }

    let mut resolutions: Vec<i32> = already_fit.iter().map(|f| f.resolution).collect();
    resolutions.sort_unstable();
    resolutions.dedup();

    let mut offsets: Vec<f64> = Vec::new();
    for f in already_fit {
        if !offsets.iter().any(|&o: &f64| (o - f.dh).abs() < 1e-6) {
            offsets.push(f.dh);
        }
    }

    let mut best: Option<(i32, f64, f64, f64)> = None; // (R, dh, phi0, loss)

    for &resolution in &resolutions {
        let step = std::f64::consts::TAU / resolution as f64;
        for &dh in &offsets {
            let deltas: Vec<f64> = indices
                .iter()
                .map(|&p| {
                    let theta = points.theta()[p];
                    let r_xy = points.range_xy()[p];
                    let corrected = (theta - dh / r_xy).rem_euclid(std::f64::consts::TAU);
                    let snapped = (corrected / step + 0.5).floor() * step;
                    corrected - snapped
                })
                .collect();
            let mean_delta = deltas.iter().sum::<f64>() / deltas.len() as f64;
            let loss = deltas.iter().map(|&d| (d - mean_delta).abs()).sum::<f64>() / deltas.len() as f64 * resolution as f64;

            if best.map(|(_, _, _, l)| loss < l).unwrap_or(true) {
                best = Some((resolution, dh, mean_delta.rem_euclid(step), loss));
            }
        }
    }

    best.map(|(resolution, dh, phi0, _)| HorizontalFit { dh, phi0, resolution, heuristic: true })
}

/// Fits every scanline: a direct pass for those with enough points, then a
/// heuristic pass (borrowing from the direct results) for the rest.
pub fn estimate_all(points: &PointArray, scanline_points: &[Vec<usize>], config: &HorizontalConfig) -> Vec<HorizontalFit> {
    let mut results: Vec<Option<HorizontalFit>> = vec![None; scanline_points.len()];

    for (i, indices) in scanline_points.iter().enumerate() {
        results[i] = fit_direct(points, indices, config);
    }

    let direct_so_far: Vec<HorizontalFit> = results.iter().filter_map(|r| *r).collect();
    for (i, indices) in scanline_points.iter().enumerate() {
        if results[i].is_none() {
            results[i] = fit_heuristic(points, indices, &direct_so_far).or(Some(HorizontalFit {
                dh: 0.0,
                phi0: 0.0,
                resolution: indices.len().max(1) as i32,
                heuristic: true,
            }));
        }
    }

    results.into_iter().map(|r| r.unwrap()).collect()
}
