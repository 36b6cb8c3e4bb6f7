//! lidar-intrinsics CLI — runs the estimator against a point-cloud JSON
//! file and writes the recovered intrinsics to stdout or a file.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use lidar_intrinsics::{EstimatorConfig, PointCloud};

#[derive(Parser, Debug)]
#[command(name = "lidar-intrinsics", about = "Recovers LiDAR scanline intrinsics from a point cloud")]
struct Args {
    /// Point cloud JSON file: {"x":[...],"y":[...],"z":[...]}
    input: PathBuf,

    /// Where to write the resulting JSON. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit per-scanline diagnostics (uncertainty, hough votes, heuristic
    /// flags) instead of the stable Intrinsics schema.
    #[arg(long)]
    detailed: bool,

    /// Optional TOML config file overriding EstimatorConfig defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `vertical.offset_step`.
    #[arg(long)]
    offset_step: Option<f64>,

    /// Overrides `vertical.angle_step`.
    #[arg(long)]
    angle_step: Option<f64>,

    /// Overrides `vertical.max_iterations`.
    #[arg(long)]
    max_iterations: Option<u64>,

    /// JSON indent width; -1 for compact.
    #[arg(long, default_value_t = -1)]
    indent: i32,
}

#[derive(Serialize)]
struct ScanlineDetailRecord {
    vertical_offset: f64,
    vertical_angle: f64,
    horizontal_offset: f64,
    azimuthal_offset: f64,
    resolution: i32,
    uncertainty: f64,
    hough_votes: i64,
    point_count: usize,
    vertical_heuristic: bool,
    horizontal_heuristic: bool,
}

#[derive(Serialize)]
struct DetailedRecord {
    scanlines: Vec<ScanlineDetailRecord>,
    iterations: u64,
    unassigned_points: usize,
    end_reason: lidar_intrinsics::EndReason,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "lidar_intrinsics=info".into()))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<EstimatorConfig>(&raw).with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => EstimatorConfig::default(),
    };
    if let Some(v) = args.offset_step {
        config.vertical.offset_step = v;
    }
    if let Some(v) = args.angle_step {
        config.vertical.angle_step = v;
    }
    if let Some(v) = args.max_iterations {
        config.vertical.max_iterations = v;
    }

    let cloud_json = fs::read_to_string(&args.input).with_context(|| format!("reading point cloud file {}", args.input.display()))?;
    let cloud: PointCloud = serde_json::from_str(&cloud_json).with_context(|| format!("parsing point cloud JSON in {}", args.input.display()))?;

    info!(points = cloud.len(), "loaded point cloud");

    let output_json = if args.detailed {
        let detailed = lidar_intrinsics::estimate_intrinsics_detailed_with_config(&cloud, &config)?;
        let record = DetailedRecord {
            scanlines: detailed
                .scanlines
                .iter()
                .map(|d| ScanlineDetailRecord {
                    vertical_offset: d.scanline.vertical_offset,
                    vertical_angle: d.scanline.vertical_angle,
                    horizontal_offset: d.scanline.horizontal_offset,
                    azimuthal_offset: d.scanline.azimuthal_offset,
                    resolution: d.scanline.resolution,
                    uncertainty: d.uncertainty,
                    hough_votes: d.hough_votes,
                    point_count: d.point_count,
                    vertical_heuristic: d.vertical_heuristic,
                    horizontal_heuristic: d.horizontal_heuristic,
                })
                .collect(),
            iterations: detailed.iterations,
            unassigned_points: detailed.unassigned_points,
            end_reason: detailed.end_reason,
        };
        if args.indent < 0 {
            serde_json::to_string(&record)?
        } else {
            serde_json::to_string_pretty(&record)?
        }
    } else {
        let intrinsics = lidar_intrinsics::estimate_intrinsics_with_config(&cloud, &config)?;
        lidar_intrinsics::intrinsics_to_json_str(&intrinsics, args.indent)?
    };

    match args.output {
        Some(path) => {
            fs::write(&path, output_json).with_context(|| format!("writing output to {}", path.display()))?;
            info!(path = %path.display(), "wrote intrinsics");
        }
        None => println!("{output_json}"),
    }

    Ok(())
}
