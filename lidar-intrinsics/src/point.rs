//! PointArray — precomputed polar fields over an unordered point cloud.
//!
//! Built once per estimation call and never mutated again; every estimator
//! downstream holds a shared reference to it.

use crate::error::{IntrinsicsError, Result};

/// Raw Cartesian point cloud as supplied by the caller.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PointCloud {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Owned arrays of a point cloud's Cartesian coordinates plus everything
/// derived from them in polar form.
///
/// All arrays have the same length `N`. `range` and `range_xy` are strictly
/// positive for every point — that is enforced at construction time, not
/// re-checked by callers.
#[derive(Debug, Clone)]
pub struct PointArray {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    range: Vec<f64>,
    range_xy: Vec<f64>,
    phi: Vec<f64>,
    theta: Vec<f64>,
    inv_range: Vec<f64>,
    inv_range_xy: Vec<f64>,
    range_min: f64,
    range_max: f64,
    /// Inferred upper bound on per-axis Cartesian quantization.
    coords_eps: f64,
}

impl PointArray {
    /// Builds the derived polar fields, validating the input cloud.
    ///
    /// Fails with [`IntrinsicsError::MismatchedSizes`] if `x`, `y`, `z`
    /// differ in length, [`IntrinsicsError::EmptyPointCloud`] if `N == 0`,
    /// and [`IntrinsicsError::RangesXyZero`] if any point has `r_xy == 0`.
    pub fn new(cloud: &PointCloud) -> Result<Self> {
        let n = cloud.x.len();
        if cloud.y.len() != n || cloud.z.len() != n {
            return Err(IntrinsicsError::MismatchedSizes {
                x: cloud.x.len(),
                y: cloud.y.len(),
                z: cloud.z.len(),
            });
        }
        if n == 0 {
            return Err(IntrinsicsError::EmptyPointCloud);
        }

        let mut range = Vec::with_capacity(n);
        let mut range_xy = Vec::with_capacity(n);
        let mut phi = Vec::with_capacity(n);
        let mut theta = Vec::with_capacity(n);
        let mut inv_range = Vec::with_capacity(n);
        let mut inv_range_xy = Vec::with_capacity(n);

        for i in 0..n {
            let (px, py, pz) = (cloud.x[i], cloud.y[i], cloud.z[i]);
            let rxy = (px * px + py * py).sqrt();
            if rxy == 0.0 {
                return Err(IntrinsicsError::RangesXyZero { index: i });
            }
            let r = (rxy * rxy + pz * pz).sqrt();
            range.push(r);
            range_xy.push(rxy);
            phi.push((pz / r).asin());
            theta.push(py.atan2(px));
            inv_range.push(1.0 / r);
            inv_range_xy.push(1.0 / rxy);
        }

        let range_min = range.iter().copied().fold(f64::INFINITY, f64::min);
        let range_max = range.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let coords_eps = infer_coords_eps(&cloud.x, &cloud.y, &cloud.z);

        Ok(Self {
            x: cloud.x.clone(),
            y: cloud.y.clone(),
            z: cloud.z.clone(),
            range,
            range_xy,
            phi,
            theta,
            inv_range,
            inv_range_xy,
            range_min,
            range_max,
            coords_eps,
        })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }
    pub fn y(&self) -> &[f64] {
        &self.y
    }
    pub fn z(&self) -> &[f64] {
        &self.z
    }
    pub fn range(&self) -> &[f64] {
        &self.range
    }
    pub fn range_xy(&self) -> &[f64] {
        &self.range_xy
    }
    pub fn phi(&self) -> &[f64] {
        &self.phi
    }
    pub fn theta(&self) -> &[f64] {
        &self.theta
    }
    pub fn inv_range(&self) -> &[f64] {
        &self.inv_range
    }
    pub fn inv_range_xy(&self) -> &[f64] {
        &self.inv_range_xy
    }
    pub fn range_min(&self) -> f64 {
        self.range_min
    }
    pub fn range_max(&self) -> f64 {
        self.range_max
    }
    pub fn coords_eps(&self) -> f64 {
        self.coords_eps
    }
}

/// Infers a safe upper bound on Cartesian quantization from the smallest
/// positive gap between sorted absolute coordinate values, floored at
/// `1e-6` so degenerate (e.g. all-zero-one-axis) inputs never yield a
/// zero bound that would make every error-bound computation blow up.
fn infer_coords_eps(x: &[f64], y: &[f64], z: &[f64]) -> f64 {
    let mut abs_coords: Vec<f64> = x
        .iter()
        .chain(y.iter())
        .chain(z.iter())
        .map(|v| v.abs())
        .collect();
    abs_coords.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut smallest_gap = f64::INFINITY;
    for w in abs_coords.windows(2) {
        let gap = w[1] - w[0];
        if gap > 0.0 && gap < smallest_gap {
            smallest_gap = gap;
        }
    }

    if smallest_gap.is_finite() {
        smallest_gap.max(1e-6)
    } else {
        1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(n: usize) -> PointCloud {
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for i in 0..n {
            let t = i as f64 * 0.01;
            x.push(10.0 + t);
            y.push(1.0 + t * 0.5);
            z.push(0.2 - t * 0.1);
        }
        PointCloud { x, y, z }
    }

    #[test]
    fn rejects_mismatched_sizes() {
        let mut c = cloud(4);
        c.y.pop();
        let err = PointArray::new(&c).unwrap_err();
        assert!(matches!(err, IntrinsicsError::MismatchedSizes { .. }));
    }

    #[test]
    fn rejects_empty_cloud() {
        let c = PointCloud::default();
        let err = PointArray::new(&c).unwrap_err();
        assert!(matches!(err, IntrinsicsError::EmptyPointCloud));
    }

    #[test]
    fn rejects_zero_range_xy() {
        let mut c = cloud(3);
        c.x[1] = 0.0;
        c.y[1] = 0.0;
        let err = PointArray::new(&c).unwrap_err();
        assert!(matches!(err, IntrinsicsError::RangesXyZero { index: 1 }));
    }

    #[test]
    fn derives_consistent_polar_fields() {
        let c = cloud(16);
        let pa = PointArray::new(&c).unwrap();
        for i in 0..pa.len() {
            let expect_r = (c.x[i].powi(2) + c.y[i].powi(2) + c.z[i].powi(2)).sqrt();
            assert!((pa.range()[i] - expect_r).abs() < 1e-12);
            assert!((pa.inv_range()[i] - 1.0 / expect_r).abs() < 1e-12);
        }
        assert!(pa.coords_eps() >= 1e-6);
    }
}
