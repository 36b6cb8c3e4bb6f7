//! Conflict resolution between a freshly-fitted candidate and the
//! already-accepted scanlines in the pool (design doc §4.5).

use std::collections::VecDeque;

use tracing::debug;

use crate::hough::HoughAccumulator;
use crate::point::PointArray;

use super::pool::{Candidate, ScanlinePool};

pub enum Resolution {
    /// `empirical_only` tells the caller whether to free the winning
    /// peak's votes via `remove_votes` (heuristic candidates, which never
    /// consumed the peak hash's own cells) or `erase_by_hash` (fitted
    /// candidates, which did).
    Accepted { id: u32, empirical_only: bool },
    Rejected,
}

/// Decides whether `candidate` is accepted, accepted with retraction of
/// conflicting scanlines, or rejected — per the empirical/theoretical
/// conflict rules, the last-candidate shortcut, and the `U = -logL`
/// comparison against the weakest conflicting scanline.
pub fn resolve(pool: &mut ScanlinePool, acc: &mut HoughAccumulator, points: &PointArray, candidate: Candidate) -> Resolution {
    let (empirical, theoretical) = pool.conflicts(&candidate.points, &candidate.angle_bounds);

    if empirical.is_empty() && theoretical.is_empty() {
        return accept(pool, candidate);
    }

    let remaining = pool.unassigned_points();
    if empirical.is_empty() && candidate.points.len() == remaining.len() && candidate.points.iter().all(|p| remaining.contains(p)) {
        return accept(pool, candidate);
    }

    let conflicting: Vec<u32> = empirical.iter().chain(theoretical.iter()).copied().collect();
    let weakest = conflicting.iter().filter_map(|&id| pool.get(id)).map(|c| c.uncertainty).fold(f64::INFINITY, f64::min);

    if candidate.uncertainty.is_infinite() && weakest.is_infinite() {
        return if empirical.is_empty() {
            accept(pool, candidate)
        } else {
            reject(acc, &conflicting, pool, candidate.hough_hash, candidate.uncertainty)
        };
    }

    let margin = weakest - 1e-6;
    if candidate.uncertainty >= margin {
        return reject(acc, &conflicting, pool, candidate.hough_hash, candidate.uncertainty);
    }

    // candidate.uncertainty < margin: accept and retract every conflicting
    // scanline, transitively pulling in anything that borrowed from them.
    let mut queue: VecDeque<u32> = conflicting.iter().copied().collect();
    let mut to_retract = std::collections::BTreeSet::new();
    while let Some(id) = queue.pop_front() {
        if !to_retract.insert(id) {
            continue;
        }
        for dep in pool.dependents_of(id) {
            queue.push_back(dep);
        }
    }

    for id in &to_retract {
        if let Some(retracted) = pool.retract(*id) {
            debug!(scanline_id = id, "retracted due to stronger conflicting candidate");
            acc.add_votes(points, &retracted.points);
            acc.unblock_scanline(*id);
        }
    }

    accept(pool, candidate)
}

fn accept(pool: &mut ScanlinePool, candidate: Candidate) -> Resolution {
    let empirical_only = candidate.heuristic;
    let id = pool.accept(candidate);
    Resolution::Accepted { id, empirical_only }
}

fn reject(acc: &mut HoughAccumulator, conflicting: &[u32], pool: &ScanlinePool, candidate_hash: u64, candidate_uncertainty: f64) -> Resolution {
    let blockers: Vec<u32> = conflicting
        .iter()
        .copied()
        .filter(|&id| pool.get(id).map(|c| c.uncertainty <= candidate_uncertainty).unwrap_or(false))
        .collect();
    let blockers = if blockers.is_empty() { conflicting.to_vec() } else { blockers };

    acc.erase_by_hash(candidate_hash);
    acc.mark_blocked(candidate_hash, blockers);
    Resolution::Rejected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::PointCloud;
    use crate::vertical::pool::ScanlineAngleBounds;

    fn dummy_candidate(id: u32, points: Vec<usize>, uncertainty: f64) -> Candidate {
        Candidate {
            id,
            dz: 0.0,
            dz_ci: (-0.01, 0.01),
            alpha: 0.0,
            alpha_ci: (-0.01, 0.01),
            angle_bounds: ScanlineAngleBounds { lower: (0.0, 0.0), upper: (0.0, 0.0) },
            points,
            uncertainty,
            hough_hash: 0,
            hough_votes: 0,
            heuristic: false,
            dependencies: Vec::new(),
        }
    }

    fn tiny_points() -> PointArray {
        let cloud = PointCloud { x: vec![10.0, 10.0, 10.0, 10.0], y: vec![1.0, 1.0, 1.0, 1.0], z: vec![0.1, 0.1, 0.2, 0.2] };
        PointArray::new(&cloud).unwrap()
    }

    #[test]
    fn no_conflict_accepts_directly() {
        let pa = tiny_points();
        let mut pool = ScanlinePool::new(pa.len());
        let mut acc = HoughAccumulator::new(-0.5, 0.5, 1e-2, -1.0, 1.0, 1e-2);
        let candidate = dummy_candidate(0, vec![0, 1], 1.0);
        match resolve(&mut pool, &mut acc, &pa, candidate) {
            Resolution::Accepted { empirical_only, .. } => assert!(!empirical_only),
            Resolution::Rejected => panic!("expected accept"),
        }
    }

    #[test]
    fn stronger_candidate_retracts_weaker_conflicting_one() {
        let pa = tiny_points();
        let mut pool = ScanlinePool::new(pa.len());
        let mut acc = HoughAccumulator::new(-0.5, 0.5, 1e-2, -1.0, 1.0, 1e-2);

        let weak = dummy_candidate(0, vec![0, 1], 10.0);
        pool.accept(weak);

        let strong = dummy_candidate(0, vec![0, 1, 2], 1.0);
        match resolve(&mut pool, &mut acc, &pa, strong) {
            Resolution::Accepted { .. } => {}
            Resolution::Rejected => panic!("expected accept"),
        }
        assert_eq!(pool.iter().count(), 1);
    }

    #[test]
    fn weaker_candidate_is_rejected_and_blocks_hash() {
        let pa = tiny_points();
        let mut pool = ScanlinePool::new(pa.len());
        let mut acc = HoughAccumulator::new(-0.5, 0.5, 1e-2, -1.0, 1.0, 1e-2);

        let mut strong = dummy_candidate(0, vec![0, 1], 1.0);
        strong.hough_hash = 42;
        pool.accept(strong);

        let mut weak = dummy_candidate(0, vec![0, 1, 2], 10.0);
        weak.hough_hash = 99;
        match resolve(&mut pool, &mut acc, &pa, weak) {
            Resolution::Rejected => {}
            Resolution::Accepted { .. } => panic!("expected reject"),
        }
        assert_eq!(pool.iter().count(), 1);
    }
}
