//! Error taxonomy surfaced at the crate's public boundary.
//!
//! Everything recoverable inside the estimator (a failed fit, a wide
//! confidence interval, a conflicting accept) is handled locally and never
//! reaches this type — see [`crate::vertical`] and [`crate::horizontal`].
//! Only input validation and truly unexpected internal-invariant failures
//! are surfaced as `Err`.

use thiserror::Error;

/// Errors returned by the public entry points in [`crate`].
#[derive(Debug, Error)]
pub enum IntrinsicsError {
    #[error("x, y, z arrays have mismatched lengths ({x}, {y}, {z})")]
    MismatchedSizes { x: usize, y: usize, z: usize },

    #[error("point cloud is empty")]
    EmptyPointCloud,

    #[error("point {index} has x^2 + y^2 == 0 (undefined azimuth)")]
    RangesXyZero { index: usize },

    #[error("internal invariant violation: {0}")]
    InternalError(String),

    #[error("failed to (de)serialize intrinsics JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read/write intrinsics file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IntrinsicsError>;
