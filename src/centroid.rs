//! Running-mean centroid accumulator.

use std::collections::HashSet;

use crate::error::{RPHashError, Result};

/// A mutable running mean over full-dimensional input vectors, tagged with the
/// lattice labels it matches.
///
/// Created once per surviving top-K label at reduce-pass start; updated on
/// each matching vector; read out at end of pass.
#[derive(Debug, Clone)]
pub struct Centroid {
    sum: Vec<f64>,
    count: u64,
    labels: HashSet<i64>,
}

impl Centroid {
    /// New centroid in `dimension` space associated with a single label.
    pub fn new(dimension: usize, label: i64) -> Self {
        let mut labels = HashSet::with_capacity(1);
        labels.insert(label);
        Self {
            sum: vec![0.0; dimension],
            count: 0,
            labels,
        }
    }

    /// Associate a further label (blurred variants share the centroid).
    pub fn add_label(&mut self, label: i64) {
        self.labels.insert(label);
    }

    /// Does this centroid match `label`?
    pub fn matches(&self, label: i64) -> bool {
        self.labels.contains(&label)
    }

    /// Accumulate a vector.
    pub fn update(&mut self, v: &[f64]) -> Result<()> {
        if v.len() != self.sum.len() {
            return Err(RPHashError::DimensionMismatch {
                expected: self.sum.len(),
                found: v.len(),
            });
        }
        for (acc, &x) in self.sum.iter_mut().zip(v) {
            *acc += x;
        }
        self.count += 1;
        Ok(())
    }

    /// Number of accumulated vectors.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The associated label set.
    pub fn labels(&self) -> impl Iterator<Item = i64> + '_ {
        self.labels.iter().copied()
    }

    /// The running mean, or `None` if no vector has been accumulated.
    pub fn mean(&self) -> Option<Vec<f64>> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(self.sum.iter().map(|&s| s / n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_two() {
        let mut c = Centroid::new(3, 42);
        c.update(&[1.0, 2.0, 3.0]).unwrap();
        c.update(&[3.0, 2.0, 1.0]).unwrap();
        assert_eq!(c.mean().unwrap(), vec![2.0, 2.0, 2.0]);
        assert_eq!(c.count(), 2);
    }

    #[test]
    fn empty_has_no_mean() {
        let c = Centroid::new(4, 0);
        assert!(c.mean().is_none());
    }

    #[test]
    fn label_matching() {
        let mut c = Centroid::new(2, 7);
        c.add_label(8);
        assert!(c.matches(7));
        assert!(c.matches(8));
        assert!(!c.matches(9));
    }

    #[test]
    fn update_checks_dimension() {
        let mut c = Centroid::new(3, 1);
        assert!(c.update(&[1.0, 2.0]).is_err());
    }
}
