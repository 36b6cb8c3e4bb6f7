//! ScanlinePool — owns every live [`Candidate`], the point→scanline
//! assignment vector, and tracks unassigned points.

use std::collections::BTreeMap;

use crate::point::PointArray;

/// Theoretical angle-bound intervals derived from a candidate's CIs,
/// per design doc §4.5: `[alpha_lo + asin(dz_lo/r_max), alpha_lo +
/// asin(dz_lo/r_min)]` and the analogous upper-bound interval.
#[derive(Debug, Clone, Copy)]
pub struct ScanlineAngleBounds {
    pub lower: (f64, f64),
    pub upper: (f64, f64),
}

impl ScanlineAngleBounds {
    /// Whether `self` and `other`'s lower-line or upper-line intervals
    /// overlap (either axis counts as an intersection).
    pub fn intersects(&self, other: &ScanlineAngleBounds) -> bool {
        intervals_overlap(self.lower, other.lower)
            || intervals_overlap(self.lower, other.upper)
            || intervals_overlap(self.upper, other.lower)
            || intervals_overlap(self.upper, other.upper)
    }
}

fn intervals_overlap(a: (f64, f64), b: (f64, f64)) -> bool {
    let (a_lo, a_hi) = (a.0.min(a.1), a.0.max(a.1));
    let (b_lo, b_hi) = (b.0.min(b.1), b.0.max(b.1));
    a_lo <= b_hi && b_lo <= a_hi
}

pub fn angle_bounds(points: &PointArray, dz_ci: (f64, f64), alpha_ci: (f64, f64)) -> ScanlineAngleBounds {
    let r_min = points.range_min();
    let r_max = points.range_max();
    let alpha_lo = alpha_ci.0;
    let alpha_hi = alpha_ci.1;
    let dz_lo = dz_ci.0;
    let dz_hi = dz_ci.1;

    ScanlineAngleBounds {
        lower: (
            alpha_lo + (dz_lo / r_max).clamp(-1.0, 1.0).asin(),
            alpha_lo + (dz_lo / r_min).clamp(-1.0, 1.0).asin(),
        ),
        upper: (
            alpha_hi + (dz_hi / r_max).clamp(-1.0, 1.0).asin(),
            alpha_hi + (dz_hi / r_min).clamp(-1.0, 1.0).asin(),
        ),
    }
}

/// A live or retracted vertical scanline candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: u32,
    pub dz: f64,
    pub dz_ci: (f64, f64),
    pub alpha: f64,
    pub alpha_ci: (f64, f64),
    pub angle_bounds: ScanlineAngleBounds,
    pub points: Vec<usize>,
    /// `-logL`, or `+inf` for heuristic candidates.
    pub uncertainty: f64,
    pub hough_hash: u64,
    pub hough_votes: i64,
    pub heuristic: bool,
    /// Ids of the anchor scanlines a heuristic candidate borrowed from.
    pub dependencies: Vec<u32>,
}

pub struct ScanlinePool {
    candidates: BTreeMap<u32, Candidate>,
    assignments: Vec<Option<u32>>,
    unassigned: usize,
    next_id: u32,
}

impl ScanlinePool {
    pub fn new(n_points: usize) -> Self {
        Self {
            candidates: BTreeMap::new(),
            assignments: vec![None; n_points],
            unassigned: n_points,
            next_id: 0,
        }
    }

    pub fn unassigned_count(&self) -> usize {
        self.unassigned
    }

    pub fn get(&self, id: u32) -> Option<&Candidate> {
        self.candidates.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.values()
    }

    /// Point indices not currently assigned to any scanline.
    pub fn unassigned_points(&self) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter_map(|(i, a)| if a.is_none() { Some(i) } else { None })
            .collect()
    }

    /// Scanlines whose points overlap `candidate_points` ("empirical
    /// conflict") or whose theoretical angle bounds overlap `bounds`
    /// ("theoretical conflict"). Returns ids only.
    pub fn conflicts(&self, candidate_points: &[usize], bounds: &ScanlineAngleBounds) -> (Vec<u32>, Vec<u32>) {
        let mut empirical = Vec::new();
        let mut theoretical = Vec::new();
        for c in self.candidates.values() {
            if candidate_points.iter().any(|p| self.assignments[*p] == Some(c.id)) {
                empirical.push(c.id);
            } else if c.angle_bounds.intersects(bounds) {
                theoretical.push(c.id);
            }
        }
        (empirical, theoretical)
    }

    /// Inserts `candidate` (assigning it a fresh id), marking its points
    /// assigned. Returns the assigned id.
    pub fn accept(&mut self, mut candidate: Candidate) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        candidate.id = id;
        for &p in &candidate.points {
            if self.assignments[p].is_none() {
                self.unassigned -= 1;
            }
            self.assignments[p] = Some(id);
        }
        self.candidates.insert(id, candidate);
        id
    }

    /// Removes `id` from the pool, freeing its points back to unassigned.
    /// Returns the removed candidate.
    pub fn retract(&mut self, id: u32) -> Option<Candidate> {
        let candidate = self.candidates.remove(&id)?;
        for &p in &candidate.points {
            if self.assignments[p] == Some(id) {
                self.assignments[p] = None;
                self.unassigned += 1;
            }
        }
        Some(candidate)
    }

    /// Ids of all live candidates whose `dependencies` reference `anchor`.
    pub fn dependents_of(&self, anchor: u32) -> Vec<u32> {
        self.candidates
            .values()
            .filter(|c| c.dependencies.contains(&anchor))
            .map(|c| c.id)
            .collect()
    }

    /// Consumes the pool, returning surviving candidates sorted by alpha
    /// ascending with ids densely renumbered `0..S`.
    pub fn into_sorted_dense(self) -> Vec<Candidate> {
        let mut scanlines: Vec<Candidate> = self.candidates.into_values().collect();
        scanlines.sort_by(|a, b| a.alpha.partial_cmp(&b.alpha).unwrap_or(std::cmp::Ordering::Equal));
        for (new_id, s) in scanlines.iter_mut().enumerate() {
            s.id = new_id as u32;
        }
        scanlines
    }
}
