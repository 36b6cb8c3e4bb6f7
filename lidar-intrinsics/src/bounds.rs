//! Per-point error-bound computation (design doc §4.4).
//!
//! For a proposed vertical offset `dz`, derives an upper bound on the
//! expected deviation of `phi` from quantization noise in the input
//! coordinates. Drives both Hough band membership and WLS weights.

use crate::point::PointArray;

/// `bound_p = phi_bound_p + corr_bound_p` for a single point at reciprocal
/// range `inv_range_xy`/`inv_range`, given a proposed `dz`.
pub fn point_bound(points: &PointArray, index: usize, dz: f64) -> f64 {
    let eps = points.coords_eps();
    let r_xy = points.range_xy()[index];
    let r = points.range()[index];
    let z = points.z()[index];

    let phi_bound = (2f64.sqrt() * eps * z.abs() + eps * r_xy) / (r_xy * r_xy - 2f64.sqrt() * eps * r_xy);
    let corr_bound = dz.abs() * 3f64.sqrt() * eps / (r * r - 3f64.sqrt() * eps * r);

    phi_bound + corr_bound
}

/// Error bounds for every point in `points`, at a fixed `dz`.
pub fn all_bounds(points: &PointArray, dz: f64) -> Vec<f64> {
    (0..points.len()).map(|i| point_bound(points, i, dz)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::PointCloud;

    #[test]
    fn bound_grows_with_offset_magnitude() {
        let cloud = PointCloud {
            x: vec![10.0, 10.0],
            y: vec![1.0, 1.0],
            z: vec![0.1, 0.1],
        };
        let pa = PointArray::new(&cloud).unwrap();
        let small = point_bound(&pa, 0, 0.0);
        let large = point_bound(&pa, 0, 0.4);
        assert!(large > small);
    }
}
