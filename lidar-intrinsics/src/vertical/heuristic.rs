//! Heuristic vertical fallback (design doc §4.6): when a fit's confidence
//! interval is too wide to trust, borrow `dz` from the nearest
//! already-accepted scanlines above and below in phi-space.

use crate::config::VerticalConfig;
use crate::point::PointArray;

use super::pool::ScanlinePool;

pub struct HeuristicResult {
    pub dz: f64,
    pub dz_ci: (f64, f64),
    pub alpha: f64,
    pub alpha_ci: (f64, f64),
    pub points: Vec<usize>,
    pub dependencies: Vec<u32>,
}

/// Builds a heuristic candidate from `band` (the failed fit's point set),
/// or returns `None` if there is no accepted scanline on one or both sides
/// to anchor against — a recoverable condition, not an invariant
/// violation; callers reject the originating peak and move on.
pub fn compute_heuristic_scanline(points: &PointArray, pool: &ScanlinePool, band: &[usize], dz_hint: f64, config: &VerticalConfig) -> Option<HeuristicResult> {
    if band.is_empty() {
        return None;
    }

    let mean_inv_r: f64 = band.iter().map(|&p| points.inv_range()[p]).sum::<f64>() / band.len() as f64;
    let mean_r = 1.0 / mean_inv_r;
    let mean_phi: f64 = band.iter().map(|&p| points.phi()[p]).sum::<f64>() / band.len() as f64;

    let mut below: Option<(u32, f64, f64)> = None; // (id, predicted_phi, dist)
    let mut above: Option<(u32, f64, f64)> = None;

    for candidate in pool.iter() {
        let predicted = (candidate.dz * mean_inv_r).clamp(-1.0, 1.0).asin() + candidate.alpha;
        let dist = (predicted - mean_phi).abs();
        if predicted <= mean_phi {
            if below.map(|(_, _, d)| dist < d).unwrap_or(true) {
                below = Some((candidate.id, predicted, dist));
            }
        } else if above.map(|(_, _, d)| dist < d).unwrap_or(true) {
            above = Some((candidate.id, predicted, dist));
        }
    }

    let (below_id, _, _) = below?;
    let (above_id, _, _) = above?;
    let s_lo = pool.get(below_id)?;
    let s_hi = pool.get(above_id)?;

    let dz_h = (s_lo.dz + s_hi.dz) / 2.0;
    let delta = (s_lo.dz_ci.0 - s_lo.dz_ci.1)
        .abs()
        .max((s_hi.dz_ci.0 - s_hi.dz_ci.1).abs());
    let dz_ci = (dz_h - delta / 2.0, dz_h + delta / 2.0);

    let alpha_h: f64 = band.iter().map(|&p| points.phi()[p] - (dz_h * points.inv_range()[p]).clamp(-1.0, 1.0).asin()).sum::<f64>() / band.len() as f64;
    let alpha_ci = {
        let a_lo = band.iter().map(|&p| points.phi()[p] - (dz_ci.0 * points.inv_range()[p]).clamp(-1.0, 1.0).asin()).sum::<f64>() / band.len() as f64;
        let a_hi = band.iter().map(|&p| points.phi()[p] - (dz_ci.1 * points.inv_range()[p]).clamp(-1.0, 1.0).asin()).sum::<f64>() / band.len() as f64;
        (a_lo.min(a_hi), a_lo.max(a_hi))
    };

    let margin = (delta / 2.0).max(config.offset_step);
    let final_points: Vec<usize> = pool
        .unassigned_points()
        .into_iter()
        .filter(|&p| {
            let r = points.range()[p];
            let predicted = alpha_h + (dz_h / r).clamp(-1.0, 1.0).asin();
            (points.phi()[p] - predicted).abs() <= margin
        })
        .collect();

    let _ = dz_hint;

    Some(HeuristicResult {
        dz: dz_h,
        dz_ci,
        alpha: alpha_h,
        alpha_ci,
        points: if final_points.is_empty() { band.to_vec() } else { final_points },
        dependencies: vec![below_id, above_id],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::PointCloud;

    #[test]
    fn returns_none_without_both_anchors() {
        let cloud = PointCloud {
            x: vec![10.0, 10.0, 10.0],
            y: vec![1.0, 1.0, 1.0],
            z: vec![0.1, 0.1, 0.1],
        };
        let pa = PointArray::new(&cloud).unwrap();
        let pool = ScanlinePool::new(pa.len());
        let config = VerticalConfig::default();
        let band = vec![0, 1, 2];
        assert!(compute_heuristic_scanline(&pa, &pool, &band, 0.0, &config).is_none());
    }
}
