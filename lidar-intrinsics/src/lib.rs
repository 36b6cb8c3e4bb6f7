//! # lidar-intrinsics
//!
//! Recovers per-scanline vertical and horizontal geometry (`dz`, `alpha`,
//! `dh`, `phi0`, `resolution`) of a spinning LiDAR sensor from an
//! unlabeled point cloud, via Hough-vote peak picking, weighted
//! least-squares fitting with iterative region refinement, conflict
//! resolution between candidate scanlines, and a periodic azimuthal fit.
//!
//! The estimator is strictly single-threaded and synchronous: one call to
//! [`estimate_intrinsics`] runs to completion on the calling thread, with
//! no suspension points exposed to callers. Progress is observable only
//! through `tracing` events — see the crate's `debug`/`info` spans in
//! [`vertical`] and [`horizontal`].

pub mod bounds;
pub mod config;
pub mod error;
pub mod horizontal;
pub mod hough;
pub mod json;
pub mod math;
pub mod point;
pub mod rangeimage;
pub mod types;
pub mod vertical;

pub use config::{EstimatorConfig, HorizontalConfig, VerticalConfig};
pub use error::{IntrinsicsError, Result};
pub use json::{intrinsics_from_json_file, intrinsics_from_json_str, intrinsics_to_json_file, intrinsics_to_json_str};
pub use point::PointCloud;
pub use rangeimage::{project_to_range_image, unproject_to_point_cloud};
pub use types::{EndReason, Intrinsics, IntrinsicsDetailed, RangeImage, Scanline, ScanlineDetail};

use point::PointArray;
use tracing::info;

/// Runs vertical then horizontal estimation under `config`, returning full
/// per-scanline diagnostics.
pub fn estimate_intrinsics_detailed_with_config(cloud: &PointCloud, config: &EstimatorConfig) -> Result<IntrinsicsDetailed> {
    let points = PointArray::new(cloud)?;

    let vertical_result = vertical::estimate(&points, &config.vertical);
    let scanline_points: Vec<Vec<usize>> = vertical_result.scanlines.iter().map(|c| c.points.clone()).collect();
    let horizontal_fits = horizontal::estimate_all(&points, &scanline_points, &config.horizontal);

    let scanlines: Vec<ScanlineDetail> = vertical_result
        .scanlines
        .iter()
        .zip(horizontal_fits.iter())
        .map(|(v, h)| ScanlineDetail {
            scanline: Scanline {
                vertical_offset: v.dz,
                vertical_angle: v.alpha,
                horizontal_offset: h.dh,
                azimuthal_offset: h.phi0,
                resolution: h.resolution,
            },
            uncertainty: v.uncertainty,
            hough_votes: v.hough_votes,
            hough_hash: v.hough_hash,
            point_count: v.points.len(),
            angle_bounds: v.angle_bounds,
            vertical_heuristic: v.heuristic,
            horizontal_heuristic: h.heuristic,
        })
        .collect();

    info!(
        scanlines = scanlines.len(),
        unassigned = vertical_result.unassigned_points,
        iterations = vertical_result.iterations,
        "intrinsics estimation complete"
    );

    Ok(IntrinsicsDetailed {
        scanlines,
        iterations: vertical_result.iterations,
        unassigned_points: vertical_result.unassigned_points,
        end_reason: vertical_result.end_reason,
    })
}

/// [`estimate_intrinsics_detailed_with_config`] under [`EstimatorConfig::default`].
pub fn estimate_intrinsics_detailed(cloud: &PointCloud) -> Result<IntrinsicsDetailed> {
    estimate_intrinsics_detailed_with_config(cloud, &EstimatorConfig::default())
}

/// [`estimate_intrinsics_detailed_with_config`], discarding diagnostics.
pub fn estimate_intrinsics_with_config(cloud: &PointCloud, config: &EstimatorConfig) -> Result<Intrinsics> {
    estimate_intrinsics_detailed_with_config(cloud, config).map(|d| d.intrinsics())
}

/// [`estimate_intrinsics_with_config`] under [`EstimatorConfig::default`].
pub fn estimate_intrinsics(cloud: &PointCloud) -> Result<Intrinsics> {
    estimate_intrinsics_with_config(cloud, &EstimatorConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_two_scanlines() -> PointCloud {
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for &alpha in &[-0.1f64, 0.1] {
            for i in 0..512 {
                let theta = i as f64 * std::f64::consts::TAU / 512.0;
                let r_xy = 10.0;
                let r = r_xy / alpha.cos();
                x.push(r_xy * theta.cos());
                y.push(r_xy * theta.sin());
                z.push(r * alpha.sin());
            }
        }
        PointCloud { x, y, z }
    }

    #[test]
    fn empty_cloud_is_rejected() {
        let cloud = PointCloud::default();
        let err = estimate_intrinsics(&cloud).unwrap_err();
        assert!(matches!(err, IntrinsicsError::EmptyPointCloud));
    }

    #[test]
    fn recovers_two_well_separated_scanlines() {
        let cloud = synthetic_two_scanlines();
        let intrinsics = estimate_intrinsics(&cloud).unwrap();
        assert_eq!(intrinsics.scanlines.len(), 2);
        assert!(intrinsics.scanlines[0].vertical_angle < intrinsics.scanlines[1].vertical_angle);
    }

    #[test]
    fn accepted_scanlines_partition_points_disjointly() {
        let cloud = synthetic_two_scanlines();
        let points = PointArray::new(&cloud).unwrap();
        let result = vertical::estimate(&points, &VerticalConfig::default());

        let mut seen = vec![false; points.len()];
        for s in &result.scanlines {
            for &p in &s.points {
                assert!(!seen[p], "point {p} assigned to two scanlines");
                seen[p] = true;
            }
        }
        let covered = seen.iter().filter(|&&b| b).count();
        assert_eq!(covered + result.unassigned_points, points.len());
    }
}
