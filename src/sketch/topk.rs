//! Bounded top-K label tracking with lazy heap deletion.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// A bounded min-heap of labels keyed by their current count estimate.
///
/// Invariants:
/// - live size (`len`) never exceeds `capacity`;
/// - every live label has both a count entry and a membership entry;
/// - when full, inserting a new label evicts the minimum-count live label.
///
/// "Update key on re-add" is implemented as lazy deletion: the heap may hold
/// stale `(count, label)` entries, recognized on pop by comparing against the
/// count map.
#[derive(Debug, Clone)]
pub(crate) struct TopK {
    capacity: usize,
    heap: BinaryHeap<Reverse<(i64, i64)>>,
    counts: HashMap<i64, i64>,
    members: HashSet<i64>,
}

impl TopK {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
            counts: HashMap::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Number of live labels.
    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    /// Insert `label` or refresh its count, evicting the minimum if the live
    /// size overflows capacity.
    pub(crate) fn update(&mut self, label: i64, count: i64) {
        let is_new = self.members.insert(label);
        self.counts.insert(label, count);
        self.heap.push(Reverse((count, label)));

        if is_new {
            while self.members.len() > self.capacity {
                self.evict_min();
            }
        }
    }

    /// Iterate the live labels (arbitrary order).
    pub(crate) fn labels(&self) -> impl Iterator<Item = i64> + '_ {
        self.members.iter().copied()
    }

    /// Pop heap entries until a live one surfaces, then remove it entirely.
    fn evict_min(&mut self) -> Option<i64> {
        while let Some(Reverse((count, label))) = self.heap.pop() {
            if self.counts.get(&label) == Some(&count) && self.members.remove(&label) {
                self.counts.remove(&label);
                return Some(label);
            }
            // Stale tombstone; discard.
        }
        None
    }

    /// Drain every live label in ascending count order. Leaves the tracker
    /// empty.
    pub(crate) fn drain(&mut self) -> (Vec<i64>, Vec<i64>) {
        let mut labels = Vec::with_capacity(self.members.len());
        let mut counts = Vec::with_capacity(self.members.len());
        while let Some(Reverse((count, label))) = self.heap.pop() {
            if self.counts.get(&label) == Some(&count) && self.members.remove(&label) {
                labels.push(label);
                counts.push(count);
            }
        }
        self.counts.clear();
        (labels, counts)
    }
}
