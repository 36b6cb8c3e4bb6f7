//! Stable, round-trip-safe JSON schema for [`Intrinsics`] (design doc §6).
//!
//! This is deliberately the *only* thing this crate serializes through a
//! public schema: the richer per-scanline diagnostics in
//! [`crate::types::IntrinsicsDetailed`] are an in-process-only product and
//! have no wire format, mirroring the reference implementation's own JSON
//! converter.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Intrinsics, Scanline};

#[derive(Serialize, Deserialize)]
struct ScanlineRecord {
    #[serde(rename = "verticalOffset")]
    vertical_offset: f64,
    #[serde(rename = "verticalAngle")]
    vertical_angle: f64,
    #[serde(rename = "horizontalOffset")]
    horizontal_offset: f64,
    #[serde(rename = "azimuthalOffset")]
    azimuthal_offset: f64,
    resolution: i32,
}

#[derive(Serialize, Deserialize)]
struct IntrinsicsRecord {
    scanlines: Vec<ScanlineRecord>,
}

impl From<&Scanline> for ScanlineRecord {
    fn from(s: &Scanline) -> Self {
        Self {
            vertical_offset: s.vertical_offset,
            vertical_angle: s.vertical_angle,
            horizontal_offset: s.horizontal_offset,
            azimuthal_offset: s.azimuthal_offset,
            resolution: s.resolution,
        }
    }
}

impl From<&ScanlineRecord> for Scanline {
    fn from(r: &ScanlineRecord) -> Self {
        Self {
            vertical_offset: r.vertical_offset,
            vertical_angle: r.vertical_angle,
            horizontal_offset: r.horizontal_offset,
            azimuthal_offset: r.azimuthal_offset,
            resolution: r.resolution,
        }
    }
}

fn to_record(intrinsics: &Intrinsics) -> IntrinsicsRecord {
    IntrinsicsRecord {
        scanlines: intrinsics.scanlines.iter().map(ScanlineRecord::from).collect(),
    }
}

fn from_record(record: IntrinsicsRecord) -> Intrinsics {
    Intrinsics {
        scanlines: record.scanlines.iter().map(Scanline::from).collect(),
    }
}

/// Serializes `intrinsics` to the stable schema. `indent` matches the
/// source API's `indent=-1` meaning "compact"; any non-negative value
/// pretty-prints with that many spaces.
pub fn intrinsics_to_json_str(intrinsics: &Intrinsics, indent: i32) -> Result<String> {
    let record = to_record(intrinsics);
    if indent < 0 {
        Ok(serde_json::to_string(&record)?)
    } else {
        Ok(serde_json::to_string_pretty(&record)?)
    }
}

pub fn intrinsics_from_json_str(s: &str) -> Result<Intrinsics> {
    let record: IntrinsicsRecord = serde_json::from_str(s)?;
    Ok(from_record(record))
}

pub fn intrinsics_to_json_file(intrinsics: &Intrinsics, path: &Path, indent: i32) -> Result<()> {
    let json = intrinsics_to_json_str(intrinsics, indent)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn intrinsics_from_json_file(path: &Path) -> Result<Intrinsics> {
    let contents = fs::read_to_string(path)?;
    intrinsics_from_json_str(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Intrinsics {
        Intrinsics {
            scanlines: vec![
                Scanline { vertical_offset: 0.01, vertical_angle: -0.1, horizontal_offset: 0.02, azimuthal_offset: 0.3, resolution: 2048 },
                Scanline { vertical_offset: -0.02, vertical_angle: 0.1, horizontal_offset: -0.01, azimuthal_offset: 0.0, resolution: 1024 },
            ],
        }
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let intrinsics = sample();
        let json = intrinsics_to_json_str(&intrinsics, -1).unwrap();
        let back = intrinsics_from_json_str(&json).unwrap();
        assert_eq!(back, intrinsics);
    }

    #[test]
    fn schema_matches_documented_field_names() {
        let json = intrinsics_to_json_str(&sample(), -1).unwrap();
        for field in ["verticalOffset", "verticalAngle", "horizontalOffset", "azimuthalOffset", "resolution"] {
            assert!(json.contains(field), "missing field {field} in {json}");
        }
        assert!(json.contains("\"scanlines\""));
    }
}
