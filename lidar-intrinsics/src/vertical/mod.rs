//! VerticalEstimator — Hough-voting peak finder coupled to a
//! weighted-least-squares fit with iterative region refinement, a conflict
//! resolver that can retract previously accepted scanlines, and a
//! heuristic fallback for scanlines whose fit confidence interval is too
//! wide to trust.

mod conflict;
mod fit;
mod heuristic;
mod pool;

pub use pool::{Candidate, ScanlineAngleBounds};

use tracing::{debug, info};

use crate::config::VerticalConfig;
use crate::hough::HoughAccumulator;
use crate::point::PointArray;

/// Why the vertical loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(clippy::enum_variant_names)]
pub enum EndReason {
    AllAssigned,
    MaxIterations,
    NoMorePeaks,
}

/// Full result of the vertical estimation loop: the surviving candidates
/// (sorted by alpha, densely renumbered) plus diagnostic counters.
pub struct VerticalResult {
    pub scanlines: Vec<Candidate>,
    pub iterations: u64,
    pub unassigned_points: usize,
    pub end_reason: EndReason,
}

/// Runs the main vertical-estimation loop described in design doc §4.3.
pub fn estimate(points: &PointArray, config: &VerticalConfig) -> VerticalResult {
    let offset_half_width = points.range_min().min(config.max_offset);
    let mut acc = HoughAccumulator::new(
        -offset_half_width,
        offset_half_width,
        config.offset_step,
        -std::f64::consts::FRAC_PI_2,
        std::f64::consts::FRAC_PI_2,
        config.angle_step,
    );
    acc.build(points);

    let mut pool = pool::ScanlinePool::new(points.len());
    let mut dz_running_mean = 0.0f64;
    let mut accepted_count = 0u64;

    let end_reason;
    let mut iterations = 0u64;

    loop {
        if pool.unassigned_count() == 0 {
            end_reason = EndReason::AllAssigned;
            break;
        }
        if iterations >= config.max_iterations {
            end_reason = EndReason::MaxIterations;
            break;
        }
        iterations += 1;

        let Some(peak) = acc.find_maximum(dz_running_mean) else {
            end_reason = EndReason::NoMorePeaks;
            break;
        };
        debug!(iteration = iterations, dz = peak.values.offset, alpha = peak.values.angle, votes = peak.votes, "hough peak");

        let seed = fit::seed_band(points, &pool, peak.values.offset, peak.values.angle, config);
        if seed.is_empty() {
            acc.erase_by_hash(peak.hash);
            continue;
        }

        let outcome = fit::run_fit_loop(points, &seed, peak.values.offset, config);

        let candidate = match outcome {
            fit::FitOutcome::Fit(result) => pool::Candidate {
                id: 0,
                dz: result.dz,
                dz_ci: result.dz_ci,
                alpha: result.alpha,
                alpha_ci: result.alpha_ci,
                angle_bounds: pool::angle_bounds(points, result.dz_ci, result.alpha_ci),
                points: result.points,
                uncertainty: result.uncertainty,
                hough_hash: peak.hash,
                hough_votes: peak.votes,
                heuristic: false,
                dependencies: Vec::new(),
            },
            fit::FitOutcome::CiTooWide { band } | fit::FitOutcome::TooFewPoints { band } => {
                match heuristic::compute_heuristic_scanline(points, &pool, &band, peak.values.offset, config) {
                    Some(h) => pool::Candidate {
                        id: 0,
                        dz: h.dz,
                        dz_ci: h.dz_ci,
                        alpha: h.alpha,
                        alpha_ci: h.alpha_ci,
                        angle_bounds: pool::angle_bounds(points, h.dz_ci, h.alpha_ci),
                        points: h.points,
                        uncertainty: f64::INFINITY,
                        hough_hash: peak.hash,
                        hough_votes: peak.votes,
                        heuristic: true,
                        dependencies: h.dependencies,
                    },
                    None => {
                        acc.erase_by_hash(peak.hash);
                        continue;
                    }
                }
            }
            fit::FitOutcome::NoConvergence => {
                acc.erase_by_hash(peak.hash);
                continue;
            }
        };

        match conflict::resolve(&mut pool, &mut acc, points, candidate) {
            conflict::Resolution::Accepted { id, empirical_only } => {
                accepted_count += 1;
                let dz = pool.get(id).unwrap().dz;
                dz_running_mean += (dz - dz_running_mean) / accepted_count as f64;
                if empirical_only {
                    let indices = pool.get(id).unwrap().points.clone();
                    acc.remove_votes(points, &indices);
                } else {
                    acc.erase_by_hash(peak.hash);
                }
                info!(scanline_id = id, dz, "scanline accepted");
            }
            conflict::Resolution::Rejected => {
                // hash already marked blocked by the resolver
            }
        }
    }

    let scanlines = pool.into_sorted_dense();
    info!(
        iterations,
        scanlines = scanlines.len(),
        unassigned = pool_unassigned_points(points.len(), &scanlines),
        ?end_reason,
        "vertical estimation finished"
    );

    VerticalResult {
        unassigned_points: pool_unassigned_points(points.len(), &scanlines),
        scanlines,
        iterations,
        end_reason,
    }
}

fn pool_unassigned_points(n: usize, scanlines: &[Candidate]) -> usize {
    n - scanlines.iter().map(|s| s.points.len()).sum::<usize>()
}
