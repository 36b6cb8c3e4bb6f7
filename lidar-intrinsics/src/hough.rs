//! HoughAccumulator — a 2-D vote grid over `(dz, alpha)` with a per-cell
//! XOR-hash fingerprint that lets the vertical estimator erase and restore
//! a peak's contribution without ever re-rasterizing the point cloud.

use std::collections::HashMap;

use crate::point::PointArray;

/// Knuth multiplicative hash of a point index, per design doc §4.2.
///
/// Point indices must fit in a `u64` — the whole scheme relies on the
/// multiplication wrapping consistently, which it does under Rust's
/// `wrapping_mul`.
pub fn knuth_hash(point_index: usize) -> u64 {
    const KNUTH_MULTIPLIER: u64 = 11_400_714_819_323_198_485;
    (point_index as u64 + 1).wrapping_mul(KNUTH_MULTIPLIER)
}

/// A single `(dz, alpha)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetAngle {
    pub offset: f64,
    pub angle: f64,
}

/// Outcome of a peak pick: the winning cell's center values, its vote
/// count, and its XOR-hash fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct HoughPeak {
    pub values: OffsetAngle,
    pub votes: i64,
    pub hash: u64,
}

/// Record kept per erased hash so its votes can later be restored without
/// recomputation: the exact `(cell index, votes removed)` pairs zeroed by
/// the erase, since `hash_accum[idx]` was exactly `h` before zeroing, XOR
/// is self-inverse, and re-depositing `h` at the same cell reproduces it.
#[derive(Debug, Clone, Default)]
struct BlockedHash {
    /// Ids of scanlines currently blocking this hash from re-emerging.
    /// An empty set means the hash is eligible for restoration.
    conflicting_ids: std::collections::BTreeSet<u32>,
    cells: Vec<(usize, i64)>,
}

pub struct HoughAccumulator {
    offset_min: f64,
    offset_step: f64,
    nx: usize,
    angle_min: f64,
    angle_step: f64,
    ny: usize,
    /// Row-major `[ny][nx]`, flattened.
    votes: Vec<i64>,
    hash_accum: Vec<u64>,
    blocked: HashMap<u64, BlockedHash>,
}

impl HoughAccumulator {
    pub fn new(offset_min: f64, offset_max: f64, offset_step: f64, angle_min: f64, angle_max: f64, angle_step: f64) -> Self {
        let nx = (((offset_max - offset_min) / offset_step).round() as usize).max(1) + 1;
        let ny = (((angle_max - angle_min) / angle_step).round() as usize).max(1) + 1;
        Self {
            offset_min,
            offset_step,
            nx,
            angle_min,
            angle_step,
            ny,
            votes: vec![0; nx * ny],
            hash_accum: vec![0; nx * ny],
            blocked: HashMap::new(),
        }
    }

    pub fn nx(&self) -> usize {
        self.nx
    }
    pub fn ny(&self) -> usize {
        self.ny
    }

    fn cell_index(&self, row: usize, col: usize) -> usize {
        row * self.nx + col
    }

    fn offset_at(&self, col: usize) -> f64 {
        self.offset_min + col as f64 * self.offset_step
    }

    /// Row index for angle `alpha`, or `None` if out of grid bounds.
    fn angle_row(&self, alpha: f64) -> Option<usize> {
        let y = ((alpha - self.angle_min) / self.angle_step).round();
        if y < 0.0 || y >= self.ny as f64 {
            None
        } else {
            Some(y as usize)
        }
    }

    /// Votes every point in `points` along its curve
    /// `alpha = phi_p - asin(dz / r_p)`, rasterized across the dz axis,
    /// filling discontinuities where the row index jumps by more than one
    /// cell between adjacent columns.
    pub fn build(&mut self, points: &PointArray) {
        let indices: Vec<usize> = (0..points.len()).collect();
        self.add_votes(points, &indices);
    }

    /// Applies the same rasterization as [`Self::build`] for a selected
    /// subset of points — used to reinstate a retracted scanline's votes.
    pub fn add_votes(&mut self, points: &PointArray, indices: &[usize]) {
        self.apply_votes(points, indices, 1);
    }

    /// Inverse of [`Self::add_votes`] — subtracts the same contributions.
    pub fn remove_votes(&mut self, points: &PointArray, indices: &[usize]) {
        self.apply_votes(points, indices, -1);
    }

    fn apply_votes(&mut self, points: &PointArray, indices: &[usize], sign: i64) {
        for &p in indices {
            let phi = points.phi()[p];
            let r = points.range()[p];
            let weight = r;
            let hash = knuth_hash(p);

            let mut prev_row: Option<usize> = None;
            for col in 0..self.nx {
                let dz = self.offset_at(col);
                let ratio = dz / r;
                if ratio.abs() > 1.0 {
                    prev_row = None;
                    continue;
                }
                let alpha = phi - ratio.asin();
                let row = match self.angle_row(alpha) {
                    Some(row) => row,
                    None => {
                        prev_row = None;
                        continue;
                    }
                };

                self.deposit(row, col, weight, hash, sign);

                if let Some(pr) = prev_row {
                    if row.abs_diff(pr) > 1 {
                        let (lo, hi) = if row < pr { (row, pr) } else { (pr, row) };
                        for filled_row in (lo + 1)..hi {
                            if col > 0 {
                                self.deposit(filled_row, col - 1, weight, hash, sign);
                            }
                            self.deposit(filled_row, col, weight, hash, sign);
                        }
                    }
                }
                prev_row = Some(row);
            }
        }
    }

    fn deposit(&mut self, row: usize, col: usize, weight: f64, hash: u64, sign: i64) {
        let idx = self.cell_index(row, col);
        self.votes[idx] += sign * weight.round() as i64;
        self.hash_accum[idx] ^= hash;
    }

    /// Picks the highest-vote cell; ties are broken in favor of the `dz`
    /// closest to `dz_hint` (the running mean of accepted candidates' dz).
    pub fn find_maximum(&self, dz_hint: f64) -> Option<HoughPeak> {
        let mut best: Option<(usize, usize)> = None;
        let mut best_votes = 0i64;

        for row in 0..self.ny {
            for col in 0..self.nx {
                let idx = self.cell_index(row, col);
                let v = self.votes[idx];
                if v <= 0 {
                    continue;
                }
                match best {
                    None => {
                        best = Some((row, col));
                        best_votes = v;
                    }
                    Some((_, bcol)) => {
                        if v > best_votes {
                            best = Some((row, col));
                            best_votes = v;
                        } else if v == best_votes {
                            let cur_dz = self.offset_at(col);
                            let best_dz = self.offset_at(bcol);
                            if (cur_dz - dz_hint).abs() < (best_dz - dz_hint).abs() {
                                best = Some((row, col));
                            }
                        }
                    }
                }
            }
        }

        best.map(|(row, col)| {
            let idx = self.cell_index(row, col);
            HoughPeak {
                values: OffsetAngle {
                    offset: self.offset_at(col),
                    angle: self.angle_min + row as f64 * self.angle_step,
                },
                votes: self.votes[idx],
                hash: self.hash_accum[idx],
            }
        })
    }

    /// Zeroes every cell whose hash equals `h`, recording the exact cells
    /// and their vote counts so a later [`Self::restore_votes`] can bring
    /// them back bit-for-bit.
    pub fn erase_by_hash(&mut self, h: u64) {
        let mut cells = Vec::new();
        for idx in 0..self.votes.len() {
            if self.hash_accum[idx] == h {
                cells.push((idx, self.votes[idx]));
                self.votes[idx] = 0;
                self.hash_accum[idx] = 0;
            }
        }
        self.blocked.entry(h).or_default().cells = cells;
    }

    /// Re-applies the votes and hash previously removed by
    /// [`Self::erase_by_hash`] for `h`. Paired with it, this round-trips
    /// the accumulator back to its pre-erase state exactly, because the
    /// erased cells are restored to precisely the `(votes, hash)` pair
    /// they held before — XOR-ing `h` back into an already-zeroed cell
    /// reproduces `h` exactly.
    pub fn restore_votes(&mut self, h: u64) {
        let Some(entry) = self.blocked.remove(&h) else {
            return;
        };
        for (idx, votes) in entry.cells {
            self.votes[idx] = votes;
            self.hash_accum[idx] ^= h;
        }
    }

    /// Marks `h` as blocked by `blocker_ids`. Must be called after
    /// [`Self::erase_by_hash`] has already recorded the cells to restore.
    pub fn mark_blocked(&mut self, h: u64, blocker_ids: impl IntoIterator<Item = u32>) {
        let entry = self.blocked.entry(h).or_default();
        entry.conflicting_ids.extend(blocker_ids);
    }

    /// Removes `blocker_id` from `h`'s blocking set; if the set becomes
    /// empty, restores the hash's votes and returns `true`.
    pub fn unblock(&mut self, h: u64, blocker_id: u32) -> bool {
        let Some(entry) = self.blocked.get_mut(&h) else {
            return false;
        };
        entry.conflicting_ids.remove(&blocker_id);
        if entry.conflicting_ids.is_empty() {
            self.restore_votes(h);
            true
        } else {
            false
        }
    }

    /// Removes `blocker_id` from every hash's blocking set — used when a
    /// scanline is retracted, since its id can no longer block anything.
    /// Returns the hashes that became unblocked and had their votes
    /// restored as a side effect.
    pub fn unblock_scanline(&mut self, blocker_id: u32) -> Vec<u64> {
        let affected: Vec<u64> = self
            .blocked
            .iter()
            .filter(|(_, entry)| entry.conflicting_ids.contains(&blocker_id))
            .map(|(&h, _)| h)
            .collect();

        let mut restored = Vec::new();
        for h in affected {
            if self.unblock(h, blocker_id) {
                restored.push(h);
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::PointCloud;

    fn synthetic_cone(n: usize, dz: f64, alpha: f64) -> PointCloud {
        let mut x = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        let mut z = Vec::with_capacity(n);
        for i in 0..n {
            let theta = (i as f64) * std::f64::consts::TAU / n as f64;
            let r_xy = 10.0;
            let r = r_xy / alpha.cos().max(0.1);
            let phi = alpha + (dz / r).asin();
            let rr = r_xy / phi.cos();
            x.push(rr * phi.cos() * theta.cos());
            y.push(rr * phi.cos() * theta.sin());
            z.push(rr * phi.sin());
        }
        PointCloud { x, y, z }
    }

    #[test]
    fn knuth_hash_is_deterministic_and_varies_by_index() {
        assert_eq!(knuth_hash(5), knuth_hash(5));
        assert_ne!(knuth_hash(5), knuth_hash(6));
    }

    #[test]
    fn add_then_remove_votes_is_identity() {
        let cloud = synthetic_cone(64, 0.0, -0.1);
        let pa = PointArray::new(&cloud).unwrap();
        let mut acc = HoughAccumulator::new(-0.5, 0.5, 1e-2, -1.0, 1.0, 1e-2);
        let before = acc.votes.clone();
        let indices: Vec<usize> = (0..pa.len()).collect();
        acc.add_votes(&pa, &indices);
        acc.remove_votes(&pa, &indices);
        assert_eq!(acc.votes, before);
        assert_eq!(acc.hash_accum, vec![0u64; acc.hash_accum.len()]);
    }

    #[test]
    fn erase_then_restore_is_identity() {
        let cloud = synthetic_cone(256, 0.0, -0.1);
        let pa = PointArray::new(&cloud).unwrap();
        let mut acc = HoughAccumulator::new(-0.5, 0.5, 1e-2, -1.0, 1.0, 1e-2);
        acc.build(&pa);
        let before_votes = acc.votes.clone();
        let before_hash = acc.hash_accum.clone();

        let peak = acc.find_maximum(0.0).expect("expected a peak");
        acc.erase_by_hash(peak.hash);
        assert!(acc.votes != before_votes || acc.hash_accum != before_hash);
        acc.restore_votes(peak.hash);

        assert_eq!(acc.votes, before_votes);
        assert_eq!(acc.hash_accum, before_hash);
    }

    #[test]
    fn find_maximum_picks_a_populated_cell() {
        let cloud = synthetic_cone(256, 0.0, -0.1);
        let pa = PointArray::new(&cloud).unwrap();
        let mut acc = HoughAccumulator::new(-0.5, 0.5, 1e-2, -1.0, 1.0, 1e-2);
        acc.build(&pa);
        let peak = acc.find_maximum(0.0).expect("expected a peak");
        assert!(peak.votes > 0);
    }
}
