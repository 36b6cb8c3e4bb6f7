//! Shared numerical building blocks: weighted/ordinary linear regression,
//! Student-t quantiles, weighted median, and a trig lookup table used by
//! the horizontal estimator's circular-mean intercept computation.

use std::sync::OnceLock;

/// Size of the sin/cos lookup table spanning `[0, 2*pi)`.
const TRIG_TABLE_SIZE: usize = 65_536;

struct TrigTable {
    sin: Vec<f64>,
    cos: Vec<f64>,
}

static TRIG_TABLE: OnceLock<TrigTable> = OnceLock::new();

fn trig_table() -> &'static TrigTable {
    TRIG_TABLE.get_or_init(|| {
        let mut sin = Vec::with_capacity(TRIG_TABLE_SIZE);
        let mut cos = Vec::with_capacity(TRIG_TABLE_SIZE);
        for i in 0..TRIG_TABLE_SIZE {
            let angle = (i as f64) * std::f64::consts::TAU / TRIG_TABLE_SIZE as f64;
            sin.push(angle.sin());
            cos.push(angle.cos());
        }
        TrigTable { sin, cos }
    })
}

/// Maps an angle in `[0, 2*pi)` to a table index, truncating rather than
/// rounding — matching the quantization the reference implementation's
/// circular-mean computation relies on.
fn angle_to_index(angle: f64) -> usize {
    let period = std::f64::consts::TAU;
    let wrapped = angle.rem_euclid(period);
    let idx = (wrapped / period * TRIG_TABLE_SIZE as f64) as usize;
    idx.min(TRIG_TABLE_SIZE - 1)
}

pub fn table_sin(angle: f64) -> f64 {
    trig_table().sin[angle_to_index(angle)]
}

pub fn table_cos(angle: f64) -> f64 {
    trig_table().cos[angle_to_index(angle)]
}

/// Circular mean of a set of residuals known to lie on a period `period`,
/// mapped onto the unit circle via the lookup table above, then mapped
/// back into `[0, period)`.
pub fn circular_mean(residuals: &[f64], period: f64) -> f64 {
    let mut sum_sin = 0.0;
    let mut sum_cos = 0.0;
    for &r in residuals {
        let angle = r / period * std::f64::consts::TAU;
        sum_sin += table_sin(angle);
        sum_cos += table_cos(angle);
    }
    let mean_angle = sum_sin.atan2(sum_cos);
    (mean_angle / std::f64::consts::TAU * period).rem_euclid(period)
}

/// Two-sided 97.5th percentile of the Student-t distribution, i.e. the
/// multiplier for a 95% confidence interval, indexed by degrees of
/// freedom. For `df >= 30` the normal approximation `1.96` is used, as
/// documented in the reference implementation; below that a short table of
/// standard values is consulted.
pub fn student_t_975(df: u64) -> f64 {
    const TABLE: [f64; 29] = [
        12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179,
        2.160, 2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064,
        2.060, 2.056, 2.052, 2.048, 2.045,
    ];
    if df == 0 {
        return f64::INFINITY;
    }
    if df >= 30 {
        1.96
    } else {
        TABLE[(df - 1) as usize]
    }
}

/// Result of a weighted least-squares fit of `y = slope*x + intercept`.
#[derive(Debug, Clone, Copy)]
pub struct WlsFit {
    pub slope: f64,
    pub intercept: f64,
    pub slope_var: f64,
    pub intercept_var: f64,
    pub slope_ci: (f64, f64),
    pub intercept_ci: (f64, f64),
    /// `-1/2 n log(SSR) - 1/2 n (1 + log(pi/(n/2))) + 1/2 sum(log w)`.
    pub log_likelihood: f64,
    pub n: usize,
}

/// Weighted least squares of `y_i = slope * x_i + intercept`, weights
/// `w_i`, with Student-t confidence intervals (`df = n - 2`) and the
/// Gaussian log-likelihood used as the estimator's uncertainty metric.
///
/// Returns `None` if fewer than 3 points are supplied (no usable degrees
/// of freedom) or the weighted design matrix is singular.
pub fn wls_fit(x: &[f64], y: &[f64], w: &[f64]) -> Option<WlsFit> {
    let n = x.len();
    if n < 3 || y.len() != n || w.len() != n {
        return None;
    }

    let sum_w: f64 = w.iter().sum();
    if sum_w <= 0.0 {
        return None;
    }

    let mean_x: f64 = x.iter().zip(w).map(|(&xi, &wi)| wi * xi).sum::<f64>() / sum_w;
    let mean_y: f64 = y.iter().zip(w).map(|(&yi, &wi)| wi * yi).sum::<f64>() / sum_w;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        sxx += w[i] * dx * dx;
        sxy += w[i] * dx * dy;
    }
    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let mut ssr = 0.0;
    for i in 0..n {
        let residual = y[i] - (slope * x[i] + intercept);
        ssr += w[i] * residual * residual;
    }

    let df = (n - 2) as f64;
    let sigma2 = ssr / df;
    let slope_var = sigma2 / sxx;
    let intercept_var = sigma2 * (1.0 / sum_w + mean_x * mean_x / sxx);

    let t = student_t_975(n as u64 - 2);
    let slope_half = t * slope_var.sqrt();
    let intercept_half = t * intercept_var.sqrt();

    let sum_log_w: f64 = w.iter().map(|wi| wi.ln()).sum();
    let log_likelihood = -0.5 * n as f64 * ssr.max(f64::MIN_POSITIVE).ln()
        - 0.5 * n as f64 * (1.0 + (std::f64::consts::PI / (n as f64 / 2.0)).ln())
        + 0.5 * sum_log_w;

    Some(WlsFit {
        slope,
        intercept,
        slope_var,
        intercept_var,
        slope_ci: (slope - slope_half, slope + slope_half),
        intercept_ci: (intercept - intercept_half, intercept + intercept_half),
        log_likelihood,
        n,
    })
}

/// Result of an ordinary (unweighted) least-squares fit, with its MSE so
/// callers can compare candidate fits.
#[derive(Debug, Clone, Copy)]
pub struct OlsFit {
    pub slope: f64,
    pub intercept: f64,
    pub mse: f64,
}

pub fn ols_fit(x: &[f64], y: &[f64]) -> Option<OlsFit> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        sxx += dx * dx;
        sxy += dx * (y[i] - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let mse = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - (slope * xi + intercept);
            r * r
        })
        .sum::<f64>()
        / n as f64;

    Some(OlsFit {
        slope,
        intercept,
        mse,
    })
}

/// Weighted median of `values`, each paired with a positive `weight`.
/// Standard algorithm: sort by value, walk the cumulative weight until it
/// reaches half the total.
pub fn weighted_median(values: &[f64], weights: &[f64]) -> Option<f64> {
    if values.is_empty() || values.len() != weights.len() {
        return None;
    }
    let mut pairs: Vec<(f64, f64)> = values.iter().copied().zip(weights.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let total: f64 = pairs.iter().map(|&(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }

    let half = total / 2.0;
    let mut cum = 0.0;
    for &(v, w) in &pairs {
        cum += w;
        if cum >= half {
            return Some(v);
        }
    }
    pairs.last().map(|&(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wls_recovers_exact_line() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 2.0 * xi + 3.0).collect();
        let w = vec![1.0; x.len()];
        // Degenerate (zero-residual) fits have ssr == 0; nudge one point to
        // keep the log-likelihood finite for this smoke test.
        let mut y = y;
        y[0] += 1e-9;
        let fit = wls_fit(&x, &y, &w).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-6);
        assert!((fit.intercept - 3.0).abs() < 1e-5);
    }

    #[test]
    fn weighted_median_matches_unweighted_for_equal_weights() {
        let v = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        let w = vec![1.0; v.len()];
        assert_eq!(weighted_median(&v, &w), Some(3.0));
    }

    #[test]
    fn circular_mean_handles_wraparound() {
        // residuals clustered near the 0/period boundary should average
        // near 0, not near period/2
        let period = 1.0;
        let residuals = vec![0.98, 0.99, 0.01, 0.02];
        let mean = circular_mean(&residuals, period);
        let dist = (mean - 0.0).min((mean - period).abs());
        assert!(dist < 0.1, "mean={mean}");
    }

    #[test]
    fn student_t_converges_to_normal_approx() {
        assert!((student_t_975(100) - 1.96).abs() < 1e-9);
        assert!(student_t_975(1) > student_t_975(29));
    }
}
