//! End-to-end tests against the public API: full vertical+horizontal
//! estimation, JSON round-trip, and range-image projection.

use lidar_intrinsics::{estimate_intrinsics, estimate_intrinsics_detailed, intrinsics_from_json_str, intrinsics_to_json_str, project_to_range_image, unproject_to_point_cloud, IntrinsicsError, PointCloud};

/// One scanline, R=2048, dh=0.02, phi0 offset, uniform azimuth sampling,
/// and a single vertical angle — drives both estimators end to end.
fn single_scanline_cloud(n: usize, alpha: f64, dh: f64, phi0: f64, resolution: i32) -> PointCloud {
    let step = std::f64::consts::TAU / resolution as f64;
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut z = Vec::with_capacity(n);
    let r = 10.0;
    let r_xy = r * alpha.cos();
    for i in 0..n {
        let k = (i as f64 / n as f64 * resolution as f64).round();
        let theta = k * step + phi0;
        let theta_corrected = theta + dh / r_xy;
        x.push(r_xy * theta_corrected.cos());
        y.push(r_xy * theta_corrected.sin());
        z.push(r * alpha.sin());
    }
    PointCloud { x, y, z }
}

#[test]
fn single_synthetic_scanline_recovers_angle_and_absorbs_all_points() {
    let cloud = single_scanline_cloud(1024, -0.1, 0.0, 0.0, 512);
    let detailed = estimate_intrinsics_detailed(&cloud).unwrap();
    assert_eq!(detailed.scanlines.len(), 1);
    assert!((detailed.scanlines[0].scanline.vertical_angle - (-0.1)).abs() < 1e-3);
    assert_eq!(detailed.unassigned_points, 0);
    assert_eq!(detailed.end_reason, lidar_intrinsics::EndReason::AllAssigned);
}

#[test]
fn two_well_separated_scanlines_sort_by_angle_ascending() {
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut z = Vec::new();
    for &alpha in &[0.1, -0.1] {
        let c = single_scanline_cloud(512, alpha, 0.0, 0.0, 256);
        x.extend(c.x);
        y.extend(c.y);
        z.extend(c.z);
    }
    let cloud = PointCloud { x, y, z };
    let intrinsics = estimate_intrinsics(&cloud).unwrap();
    assert_eq!(intrinsics.scanlines.len(), 2);
    assert!(intrinsics.scanlines[0].vertical_angle < intrinsics.scanlines[1].vertical_angle);
}

#[test]
fn empty_point_cloud_is_rejected() {
    let cloud = PointCloud::default();
    let err = estimate_intrinsics(&cloud).unwrap_err();
    assert!(matches!(err, IntrinsicsError::EmptyPointCloud));
}

#[test]
fn json_round_trip_is_bit_exact_on_a_real_estimate() {
    let cloud = single_scanline_cloud(512, -0.1, 0.0, 0.0, 256);
    let intrinsics = estimate_intrinsics(&cloud).unwrap();
    let json = intrinsics_to_json_str(&intrinsics, -1).unwrap();
    let back = intrinsics_from_json_str(&json).unwrap();
    assert_eq!(back, intrinsics);
}

#[test]
fn range_image_round_trip_preserves_range_within_tolerance() {
    let cloud = single_scanline_cloud(256, -0.1, 0.0, 0.0, 64);
    let intrinsics = estimate_intrinsics(&cloud).unwrap();
    let image = project_to_range_image(&intrinsics, &cloud).unwrap();
    let recovered = unproject_to_point_cloud(&intrinsics, &image);

    assert!(!recovered.x.is_empty());
    for i in 0..recovered.x.len() {
        let r = (recovered.x[i].powi(2) + recovered.y[i].powi(2) + recovered.z[i].powi(2)).sqrt();
        assert!((r - 10.0).abs() < 1.0, "r={r}");
    }
}
