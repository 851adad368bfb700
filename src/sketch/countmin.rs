//! Count-Min sketch with heavy-hitter retention.

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::topk::TopK;
use super::{DEFAULT_DEPTH, k_prime};
use crate::error::{RPHashError, Result};
use crate::hash::PairwiseHash;

/// Table shape of a sketch: `depth` independent hash rows of `width` buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SketchShape {
    pub depth: usize,
    pub width: usize,
}

/// The drained top-K set: labels in ascending estimated-count order, with the
/// parallel count estimates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopLabels {
    pub labels: Vec<i64>,
    pub counts: Vec<i64>,
}

impl TopLabels {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SketchState {
    Empty,
    Accumulating,
    Drained,
}

/// Count-Min sketch paired with a bounded top-K heap (a "K heavy hitters"
/// sketch).
///
/// Estimates are upper bounds on true counts: counters are only ever
/// incremented, and the estimate takes the minimum over `depth` independent
/// rows. The top-K set is therefore approximate: colliding labels can be
/// retained spuriously, but a true heavy hitter above `e/width * N` is missed
/// only with probability decaying in `depth`.
///
/// Not thread-safe; concurrent writers need external serialization. For
/// sharded use, build one sketch per shard from the same seed and [`merge`]
/// them.
///
/// [`merge`]: KhhSketch::merge
#[derive(Debug, Clone)]
pub struct KhhSketch {
    depth: usize,
    width: usize,
    k_prime: usize,
    /// Row-major `depth x width` counter table.
    table: Vec<i64>,
    rows: Vec<PairwiseHash>,
    size: i64,
    topk: TopK,
    state: SketchState,
}

impl KhhSketch {
    /// Sketch for the top `k` labels with the default shape: `depth = 2`,
    /// `width = k'`.
    pub fn new(k: usize, seed: u64) -> Result<Self> {
        let kp = k_prime(k);
        Self::with_shape(k, SketchShape { depth: DEFAULT_DEPTH, width: kp }, seed)
    }

    /// Sketch with an explicit table shape. Row coefficients are drawn from a
    /// generator seeded with `seed`, so equal seeds give mergeable sketches.
    pub fn with_shape(k: usize, shape: SketchShape, seed: u64) -> Result<Self> {
        if k == 0 {
            return Err(RPHashError::InvalidParameter(
                "k must be positive".to_string(),
            ));
        }
        if shape.depth == 0 || shape.width == 0 {
            return Err(RPHashError::InvalidParameter(format!(
                "sketch shape must be positive, got {} x {}",
                shape.depth, shape.width
            )));
        }
        let kp = k_prime(k);
        if shape.width < kp {
            return Err(RPHashError::InvalidParameter(format!(
                "sketch width {} cannot hold top-{kp} set",
                shape.width
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let rows = (0..shape.depth)
            .map(|_| PairwiseHash::from_rng(&mut rng))
            .collect();

        Ok(Self {
            depth: shape.depth,
            width: shape.width,
            k_prime: kp,
            table: vec![0; shape.depth * shape.width],
            rows,
            size: 0,
            topk: TopK::new(kp),
            state: SketchState::Empty,
        })
    }

    pub fn shape(&self) -> SketchShape {
        SketchShape { depth: self.depth, width: self.width }
    }

    /// Top-K capacity `k'`.
    pub fn k_prime(&self) -> usize {
        self.k_prime
    }

    /// Total mass added so far (sum of all `add_long` counts).
    pub fn size(&self) -> i64 {
        self.size
    }

    /// Number of labels currently retained in the top-K set.
    pub fn top_len(&self) -> usize {
        self.topk.len()
    }

    /// Record one occurrence of `label` and track it in the top-K set.
    ///
    /// Returns the count estimate for `label` after the update.
    pub fn add(&mut self, label: i64) -> Result<i64> {
        let estimate = self.add_long(label, 1)?;
        self.topk.update(label, estimate);
        Ok(estimate)
    }

    /// Add `count` occurrences of `item` to the counter table only.
    ///
    /// Returns the estimate (minimum across rows) after the update.
    pub fn add_long(&mut self, item: i64, count: i64) -> Result<i64> {
        if self.state == SketchState::Drained {
            return Err(RPHashError::SketchDrained("add after get_top"));
        }
        self.state = SketchState::Accumulating;

        let mut min = i64::MAX;
        for (i, row) in self.rows.iter().enumerate() {
            let bucket = row.bucket(item, self.width);
            let cell = &mut self.table[i * self.width + bucket];
            *cell += count;
            min = min.min(*cell);
        }
        self.size += count;
        Ok(min)
    }

    /// Read the current estimate for `item` without mutating anything.
    pub fn estimate(&self, item: i64) -> i64 {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| self.table[i * self.width + row.bucket(item, self.width)])
            .min()
            .unwrap_or(0)
    }

    /// Drain the top-K set, ascending by estimated count.
    ///
    /// Destructive and one-shot: the sketch transitions to the drained state
    /// and rejects any further `add`, `add_long`, or `get_top`.
    pub fn get_top(&mut self) -> Result<TopLabels> {
        if self.state == SketchState::Drained {
            return Err(RPHashError::SketchDrained("get_top called twice"));
        }
        self.state = SketchState::Drained;
        let (labels, counts) = self.topk.drain();
        Ok(TopLabels { labels, counts })
    }

    /// Merge two sketches built from the same seed and shape.
    ///
    /// The merged table is the elementwise sum; the merged top-K set is
    /// rebuilt from the union of both live label sets, re-estimated against
    /// the summed table and re-capped at `k'`. Neither input may be drained.
    pub fn merge(&self, other: &KhhSketch) -> Result<KhhSketch> {
        if self.state == SketchState::Drained || other.state == SketchState::Drained {
            return Err(RPHashError::SketchDrained("merge of drained sketch"));
        }
        if self.depth != other.depth || self.width != other.width {
            return Err(RPHashError::MergeMismatch("table shapes differ"));
        }
        if self.rows != other.rows {
            return Err(RPHashError::MergeMismatch("row hash coefficients differ"));
        }
        if self.k_prime != other.k_prime {
            return Err(RPHashError::MergeMismatch("top-K capacities differ"));
        }

        let mut merged = self.clone();
        for (cell, &rhs) in merged.table.iter_mut().zip(other.table.iter()) {
            *cell += rhs;
        }
        merged.size += other.size;
        merged.state = if merged.size > 0 {
            SketchState::Accumulating
        } else {
            SketchState::Empty
        };

        // Re-rank the union of live labels against the merged table.
        // Ascending insertion order keeps eviction deterministic.
        let mut candidates: Vec<i64> = self.topk.labels().chain(other.topk.labels()).collect();
        candidates.sort_unstable();
        candidates.dedup();
        let mut ranked: Vec<(i64, i64)> = candidates
            .into_iter()
            .map(|label| (merged.estimate(label), label))
            .collect();
        ranked.sort_unstable();

        merged.topk = TopK::new(merged.k_prime);
        for (estimate, label) in ranked {
            merged.topk.update(label, estimate);
        }
        Ok(merged)
    }
}
