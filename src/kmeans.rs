//! Weighted k-means refinement of surviving centroids.
//!
//! The reduce pass leaves at most `k'` label centroids, each carrying the
//! number of vectors it absorbed. Lloyd iterations over these weighted points
//! polish them down to exactly `k` centers. Initialization is k-means++,
//! sampling proportional to weighted squared distance.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{RPHashError, Result};

/// Iteration cap for Lloyd refinement.
const MAX_ITERATIONS: usize = 20;

/// Convergence threshold on the maximum squared center shift.
const SHIFT_EPSILON: f64 = 1e-9;

/// k-means refiner over weighted points.
pub struct KMeansRefiner {
    centers: Vec<Vec<f64>>,
    dimension: usize,
    k: usize,
    seed: u64,
}

impl KMeansRefiner {
    pub fn new(dimension: usize, k: usize) -> Result<Self> {
        if dimension == 0 || k == 0 {
            return Err(RPHashError::InvalidParameter(
                "dimension and k must be positive".to_string(),
            ));
        }
        Ok(Self {
            centers: Vec::new(),
            dimension,
            k,
            seed: 0,
        })
    }

    /// Deterministic seed for k-means++ initialization.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Refine `points` (with per-point `weights`) into exactly `k` centers.
    ///
    /// When fewer than `k` points survive, the densest point is split in two
    /// with a tiny deterministic offset until `k` exist.
    pub fn fit(&mut self, points: &[Vec<f64>], weights: &[u64]) -> Result<()> {
        if points.is_empty() {
            return Err(RPHashError::EmptyInput);
        }
        if points.len() != weights.len() {
            return Err(RPHashError::InvalidParameter(format!(
                "{} points but {} weights",
                points.len(),
                weights.len()
            )));
        }
        for p in points {
            if p.len() != self.dimension {
                return Err(RPHashError::DimensionMismatch {
                    expected: self.dimension,
                    found: p.len(),
                });
            }
        }

        let (points, weights) = pad_by_splitting(points, weights, self.k, self.dimension);

        self.centers = self.plus_plus_init(&points, &weights);
        for iteration in 0..MAX_ITERATIONS {
            let assignments = self.assign(&points);
            let new_centers = self.update_centers(&points, &weights, &assignments);

            let shift = self
                .centers
                .iter()
                .zip(new_centers.iter())
                .map(|(old, new)| distance_squared(old, new))
                .fold(0.0f64, f64::max);

            self.centers = new_centers;
            if shift < SHIFT_EPSILON {
                debug!("k-means converged after {} iterations", iteration + 1);
                break;
            }
        }
        Ok(())
    }

    /// The refined centers (`k` of them after a successful `fit`).
    pub fn centers(&self) -> &[Vec<f64>] {
        &self.centers
    }

    /// k-means++ seeding, weighted.
    fn plus_plus_init(&self, points: &[Vec<f64>], weights: &[u64]) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centers: Vec<Vec<f64>> = Vec::with_capacity(self.k);

        // First center: weighted draw over the points.
        let total_weight: u64 = weights.iter().sum::<u64>().max(1);
        let mut threshold = rng.random_range(0..total_weight);
        let mut first = 0;
        for (i, &w) in weights.iter().enumerate() {
            if threshold < w {
                first = i;
                break;
            }
            threshold -= w;
        }
        centers.push(points[first].clone());

        // Remaining centers: proportional to weight * squared distance to the
        // nearest chosen center.
        while centers.len() < self.k {
            let scores: Vec<f64> = points
                .iter()
                .zip(weights)
                .map(|(p, &w)| {
                    let nearest = centers
                        .iter()
                        .map(|c| distance_squared(p, c))
                        .fold(f64::INFINITY, f64::min);
                    w as f64 * nearest
                })
                .collect();
            let total: f64 = scores.iter().sum();
            if total <= 0.0 {
                // All remaining mass sits on chosen centers; reuse the
                // heaviest point.
                centers.push(points[first].clone());
                continue;
            }

            let mut cut = rng.random::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, &s) in scores.iter().enumerate() {
                cut -= s;
                if cut <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            centers.push(points[chosen].clone());
        }
        centers
    }

    fn assign(&self, points: &[Vec<f64>]) -> Vec<usize> {
        points
            .iter()
            .map(|p| {
                let mut best = 0;
                let mut best_dist = f64::INFINITY;
                for (i, c) in self.centers.iter().enumerate() {
                    let d = distance_squared(p, c);
                    if d < best_dist {
                        best_dist = d;
                        best = i;
                    }
                }
                best
            })
            .collect()
    }

    fn update_centers(
        &self,
        points: &[Vec<f64>],
        weights: &[u64],
        assignments: &[usize],
    ) -> Vec<Vec<f64>> {
        let mut sums = vec![vec![0.0; self.dimension]; self.k];
        let mut masses = vec![0u64; self.k];

        for ((p, &w), &cluster) in points.iter().zip(weights).zip(assignments) {
            masses[cluster] += w;
            for (acc, &x) in sums[cluster].iter_mut().zip(p) {
                *acc += w as f64 * x;
            }
        }

        sums.into_iter()
            .zip(masses)
            .enumerate()
            .map(|(i, (sum, mass))| {
                if mass > 0 {
                    sum.into_iter().map(|s| s / mass as f64).collect()
                } else {
                    // Empty cluster: keep its previous center.
                    self.centers[i].clone()
                }
            })
            .collect()
    }
}

/// Ensure at least `k` weighted points by repeatedly splitting the densest.
fn pad_by_splitting(
    points: &[Vec<f64>],
    weights: &[u64],
    k: usize,
    dimension: usize,
) -> (Vec<Vec<f64>>, Vec<u64>) {
    let mut points = points.to_vec();
    let mut weights = weights.to_vec();

    let mut split_round = 0usize;
    while points.len() < k {
        let densest = weights
            .iter()
            .enumerate()
            .max_by_key(|&(_, &w)| w)
            .map(|(i, _)| i)
            .unwrap_or(0);

        let mut twin = points[densest].clone();
        twin[split_round % dimension] += 1e-6;
        split_round += 1;

        let half = weights[densest] / 2;
        weights[densest] -= half;
        points.push(twin);
        weights.push(half.max(1));
    }
    (points, weights)
}

fn distance_squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn separates_two_groups() {
        let points = vec![
            vec![0.0, 0.0],
            vec![0.2, -0.1],
            vec![10.0, 10.0],
            vec![10.1, 9.9],
        ];
        let weights = vec![5, 5, 5, 5];
        let mut refiner = KMeansRefiner::new(2, 2).unwrap().with_seed(3);
        refiner.fit(&points, &weights).unwrap();

        let mut centers = refiner.centers().to_vec();
        centers.sort_by(|a, b| a[0].total_cmp(&b[0]));
        assert!(centers[0][0] < 1.0);
        assert!(centers[1][0] > 9.0);
    }

    #[test]
    fn pads_when_fewer_points_than_k() {
        let points = vec![vec![1.0, 1.0]];
        let weights = vec![10];
        let mut refiner = KMeansRefiner::new(2, 3).unwrap();
        refiner.fit(&points, &weights).unwrap();
        assert_eq!(refiner.centers().len(), 3);
        for c in refiner.centers() {
            assert!((c[0] - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn deterministic_given_seed() {
        let points: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![(i % 4) as f64 * 5.0, (i / 4) as f64 * 5.0])
            .collect();
        let weights = vec![1u64; 12];

        let mut a = KMeansRefiner::new(2, 3).unwrap().with_seed(11);
        let mut b = KMeansRefiner::new(2, 3).unwrap().with_seed(11);
        a.fit(&points, &weights).unwrap();
        b.fit(&points, &weights).unwrap();
        assert_eq!(a.centers(), b.centers());
    }

    #[test]
    fn heavier_points_pull_centers() {
        let points = vec![vec![0.0], vec![1.0]];
        let weights = vec![99, 1];
        let mut refiner = KMeansRefiner::new(1, 1).unwrap().with_seed(0);
        refiner.fit(&points, &weights).unwrap();
        assert_abs_diff_eq!(refiner.centers()[0][0], 0.01, epsilon = 1e-9);
    }

    #[test]
    fn rejects_empty() {
        let mut refiner = KMeansRefiner::new(2, 2).unwrap();
        assert_eq!(refiner.fit(&[], &[]), Err(RPHashError::EmptyInput));
    }
}
