//! # Public result types
//!
//! The data returned from [`crate::estimate_intrinsics`] and its detailed
//! counterpart, plus the range-image product of projection/unprojection.
//!
//! ## Conventions
//!
//! - `alpha` and `phi0` are radians; `dz` and `dh` are meters.
//! - Scanline ids are densely renumbered `0..S` after sorting by `alpha`
//!   ascending — the JSON schema in [`crate::json`] does not carry ids at
//!   all, since array position *is* the id.

use serde::{Deserialize, Serialize};

/// One recovered scanline: vertical offset/angle plus horizontal
/// offset/phase/resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scanline {
    pub vertical_offset: f64,
    pub vertical_angle: f64,
    pub horizontal_offset: f64,
    pub azimuthal_offset: f64,
    pub resolution: i32,
}

/// Recovered sensor intrinsics: scanlines sorted by `vertical_angle`
/// ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub scanlines: Vec<Scanline>,
}

/// Why the vertical estimation loop stopped.
pub use crate::vertical::EndReason;

/// Per-scanline diagnostics only available from
/// [`crate::estimate_intrinsics_detailed`].
#[derive(Debug, Clone)]
pub struct ScanlineDetail {
    pub scanline: Scanline,
    pub uncertainty: f64,
    pub hough_votes: i64,
    pub hough_hash: u64,
    pub point_count: usize,
    pub angle_bounds: crate::vertical::ScanlineAngleBounds,
    pub vertical_heuristic: bool,
    pub horizontal_heuristic: bool,
}

/// Full diagnostic result of one estimation run.
#[derive(Debug, Clone)]
pub struct IntrinsicsDetailed {
    pub scanlines: Vec<ScanlineDetail>,
    pub iterations: u64,
    pub unassigned_points: usize,
    pub end_reason: EndReason,
}

impl IntrinsicsDetailed {
    pub fn intrinsics(&self) -> Intrinsics {
        Intrinsics {
            scanlines: self.scanlines.iter().map(|d| d.scanline).collect(),
        }
    }
}

/// Row-major range image: `image[row * width + col]` holds the range of the
/// point assigned there, or `0.0` for an empty pixel.
#[derive(Debug, Clone)]
pub struct RangeImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

impl RangeImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, data: vec![0.0; width * height] }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.width + col] = value;
    }
}
