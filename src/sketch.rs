// src/sketch.rs
//
// Streaming, mergeable, bounded-memory quantile sketch feeding DISTRIBUTION
// metrics. Compactor-based (KLL family): level i holds items of weight 2^i,
// over-full levels are sorted and every other item is promoted one level up.
// Compaction offsets come from a ChaCha8 stream seeded from the compaction
// ordinal, so the sketch is deterministic given the exact sequence of
// `observe` and `merge` calls.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Implementation tag carried in the wire message so downstream consumers
/// know how to decode `sketch_payload`.
pub const SKETCH_IMPL: &str = "KLL200";

/// Top-level compactor capacity. Error is O(1/k) in rank.
const DEFAULT_K: usize = 200;

/// Geometric capacity decay for lower levels, as in the KLL paper.
const CAPACITY_DECAY: f64 = 2.0 / 3.0;

const MIN_LEVEL_CAPACITY: usize = 2;

const COMPACTION_SEED: u64 = 0x6d6c_7761_7463_68; // stable across processes

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantileSketch {
    k: usize,
    count: u64,
    /// `levels[i]` holds items of weight `2^i`. Level 0 is the insert buffer.
    levels: Vec<Vec<f64>>,
    /// Number of compactions performed; seeds the next compaction's coin.
    compactions: u64,
}

impl Default for QuantileSketch {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

impl QuantileSketch {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(MIN_LEVEL_CAPACITY * 2),
            count: 0,
            levels: vec![Vec::new()],
            compactions: 0,
        }
    }

    /// Total observations fed in, including compacted-away ones.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// O(1) amortized; memory stays bounded by the capacity schedule no
    /// matter how long the stream runs.
    pub fn observe(&mut self, x: f64) {
        self.levels[0].push(x);
        self.count += 1;
        while self.retained() > self.capacity_total() {
            self.compress();
        }
    }

    /// Fold another sketch in. The result is statistically equivalent to a
    /// sketch of the union of both input streams; merging is commutative and
    /// associative up to the sketch's error bound.
    pub fn merge(&mut self, other: &QuantileSketch) {
        while self.levels.len() < other.levels.len() {
            self.levels.push(Vec::new());
        }
        for (level, items) in other.levels.iter().enumerate() {
            self.levels[level].extend_from_slice(items);
        }
        self.count += other.count;
        while self.retained() > self.capacity_total() {
            self.compress();
        }
    }

    /// Approximate value at rank `q` (0.0..=1.0). `None` on an empty sketch.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let mut weighted: Vec<(f64, u64)> = Vec::with_capacity(self.retained());
        for (level, items) in self.levels.iter().enumerate() {
            let weight = 1u64 << level;
            weighted.extend(items.iter().map(|&x| (x, weight)));
        }
        weighted.sort_by(|a, b| a.0.total_cmp(&b.0));
        let total: u64 = weighted.iter().map(|(_, w)| w).sum();
        let target = (q.clamp(0.0, 1.0) * total as f64).ceil() as u64;
        let mut cumulative = 0u64;
        for (x, w) in &weighted {
            cumulative += w;
            if cumulative >= target {
                return Some(*x);
            }
        }
        weighted.last().map(|(x, _)| *x)
    }

    /// Serialize the compactor state into the opaque wire payload. The
    /// payload is self-describing together with [`SKETCH_IMPL`].
    pub fn to_payload(&self) -> Result<bytes::Bytes> {
        let buf = serde_json::to_vec(self)?;
        Ok(bytes::Bytes::from(buf))
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    fn retained(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    fn capacity_total(&self) -> usize {
        (0..self.levels.len()).map(|l| self.level_capacity(l)).sum()
    }

    fn level_capacity(&self, level: usize) -> usize {
        let depth = self.levels.len().saturating_sub(1 + level) as i32;
        let cap = (self.k as f64 * CAPACITY_DECAY.powi(depth)).ceil() as usize;
        cap.max(MIN_LEVEL_CAPACITY)
    }

    fn compress(&mut self) {
        let level = match (0..self.levels.len())
            .find(|&l| self.levels[l].len() > self.level_capacity(l))
        {
            Some(l) => l,
            None => return,
        };
        if level + 1 == self.levels.len() {
            self.levels.push(Vec::new());
        }

        let mut items = std::mem::take(&mut self.levels[level]);
        items.sort_by(|a, b| a.total_cmp(b));

        // Odd leftover keeps its weight and stays put.
        if items.len() % 2 == 1 {
            if let Some(last) = items.pop() {
                self.levels[level].push(last);
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(COMPACTION_SEED ^ self.compactions);
        let offset = (rng.next_u32() & 1) as usize;
        self.compactions += 1;

        let promoted: Vec<f64> = items.iter().skip(offset).step_by(2).copied().collect();
        self.levels[level + 1].extend(promoted);
    }
}
