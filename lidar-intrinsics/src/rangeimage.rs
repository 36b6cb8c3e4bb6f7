//! Projection between a point cloud and a row-major range image, and back
//! (design doc §6).
//!
//! Rows index scanlines top-down (`row = height - 1 - id`); columns index
//! azimuth at a shared resolution equal to the LCM of every scanline's own
//! resolution. Both directions use the approximate (non-`asin`) curve
//! `phi ~= alpha_s + dz_s / r` the source's range-image code uses for
//! rendering — distinct from the precise `asin` curve the vertical
//! estimator fits against.

use crate::error::Result;
use crate::point::{PointArray, PointCloud};
use crate::types::{Intrinsics, RangeImage};

/// Hard ceiling on the computed LCM width, to keep a pathological
/// resolution set (e.g. several large coprime values) from allocating an
/// unreasonable image.
const MAX_WIDTH: usize = 1_000_000;

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: usize, b: usize) -> usize {
    if a == 0 || b == 0 {
        0
    } else {
        a / gcd(a, b) * b
    }
}

fn image_width(intrinsics: &Intrinsics) -> usize {
    let width = intrinsics
        .scanlines
        .iter()
        .filter(|s| s.resolution > 0)
        .map(|s| s.resolution as usize)
        .fold(1usize, lcm);
    width.clamp(1, MAX_WIDTH)
}

/// Projects `cloud` into a range image under `intrinsics`, assigning each
/// point to the scanline minimizing `|phi - dz_s/r - alpha_s|`.
pub fn project_to_range_image(intrinsics: &Intrinsics, cloud: &PointCloud) -> Result<RangeImage> {
    let points = PointArray::new(cloud)?;
    let height = intrinsics.scanlines.len();
    let width = image_width(intrinsics);
    let mut image = RangeImage::new(width, height);

    for p in 0..points.len() {
        let phi = points.phi()[p];
        let r = points.range()[p];
        let r_xy = points.range_xy()[p];
        let theta = points.theta()[p];

        let mut best: Option<(usize, f64)> = None;
        for (id, s) in intrinsics.scanlines.iter().enumerate() {
            let residual = (phi - s.vertical_offset / r - s.vertical_angle).abs();
            if best.map(|(_, b)| residual < b).unwrap_or(true) {
                best = Some((id, residual));
            }
        }
        let Some((id, _)) = best else { continue };
        let s = &intrinsics.scanlines[id];

        let corrected_theta = (theta + std::f64::consts::PI - s.horizontal_offset / r_xy - s.azimuthal_offset).rem_euclid(std::f64::consts::TAU);
        let col = ((corrected_theta / std::f64::consts::TAU) * width as f64).round() as i64;
        let col = col.rem_euclid(width as i64) as usize;
        let row = height - 1 - id;

        image.set(row, col, r);
    }

    Ok(image)
}

/// Inverts [`project_to_range_image`]: reconstructs a point cloud from a
/// range image and the intrinsics used to produce it. Empty pixels (range
/// `0.0`) are skipped.
pub fn unproject_to_point_cloud(intrinsics: &Intrinsics, image: &RangeImage) -> PointCloud {
    let height = intrinsics.scanlines.len();
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut z = Vec::new();

    for row in 0..image.height.min(height) {
        let id = height - 1 - row;
        let Some(s) = intrinsics.scanlines.get(id) else { continue };

        for col in 0..image.width {
            let r = image.get(row, col);
            if r == 0.0 {
                continue;
            }

            let phi = s.vertical_angle + s.vertical_offset / r;
            let r_xy = r * phi.cos();
            let theta = (col as f64) * std::f64::consts::TAU / image.width as f64 - std::f64::consts::PI + s.horizontal_offset / r_xy + s.azimuthal_offset;

            x.push(r_xy * theta.cos());
            y.push(r_xy * theta.sin());
            z.push(r * phi.sin());
        }
    }

    PointCloud { x, y, z }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scanline;

    fn two_scanline_intrinsics() -> Intrinsics {
        Intrinsics {
            scanlines: vec![
                Scanline { vertical_offset: 0.0, vertical_angle: -0.1, horizontal_offset: 0.0, azimuthal_offset: 0.0, resolution: 8 },
                Scanline { vertical_offset: 0.0, vertical_angle: 0.1, horizontal_offset: 0.0, azimuthal_offset: 0.0, resolution: 8 },
            ],
        }
    }

    #[test]
    fn width_is_lcm_of_resolutions() {
        let mut i = two_scanline_intrinsics();
        i.scanlines[1].resolution = 12;
        assert_eq!(image_width(&i), 24);
    }

    #[test]
    fn project_then_unproject_roughly_recovers_ranges() {
        let intrinsics = two_scanline_intrinsics();
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for k in 0..8 {
            let theta = k as f64 * std::f64::consts::TAU / 8.0;
            let phi: f64 = -0.1;
            let r: f64 = 10.0;
            let r_xy = r * phi.cos();
            x.push(r_xy * theta.cos());
            y.push(r_xy * theta.sin());
            z.push(r * phi.sin());
        }
        let cloud = PointCloud { x, y, z };

        let image = project_to_range_image(&intrinsics, &cloud).unwrap();
        let recovered = unproject_to_point_cloud(&intrinsics, &image);
        assert!(!recovered.x.is_empty());

        for i in 0..recovered.x.len() {
            let r = (recovered.x[i].powi(2) + recovered.y[i].powi(2) + recovered.z[i].powi(2)).sqrt();
            assert!((r - 10.0).abs() < 0.5, "r={r}");
        }
    }
}
