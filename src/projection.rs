//! Sparse sign-preserving random projection.
//!
//! Implements the Achlioptas construction: each matrix entry is `-1` with
//! probability 1/6, `+1` with probability 1/6, and `0` otherwise. Only the
//! indices of the nonzero entries are stored, one negative and one positive
//! index set per output row. The projection is scaled by `sqrt(3 / d)` so that
//! inner products are preserved in expectation (Johnson–Lindenstrauss).
//!
//! Construction is one-shot and deterministic given `(in_dim, out_dim, seed)`;
//! the matrix is immutable afterwards and safe to share read-only.
//!
//! # References
//!
//! - Achlioptas (2003): "Database-friendly random projections:
//!   Johnson-Lindenstrauss with binary coins"

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{RPHashError, Result};

/// A sparse `{-1, 0, +1}` random projection from `in_dim` to `out_dim`.
#[derive(Debug, Clone)]
pub struct RandomProjection {
    /// Per output row, the input indices carrying a `-1` entry.
    neg: Vec<Vec<usize>>,
    /// Per output row, the input indices carrying a `+1` entry.
    pos: Vec<Vec<usize>>,
    in_dim: usize,
    out_dim: usize,
    scale: f64,
}

impl RandomProjection {
    /// Build a projection matrix for `(in_dim, out_dim, seed)`.
    ///
    /// Expected density is 1/3; storage is `O(out_dim * in_dim / 3)` indices.
    pub fn new(in_dim: usize, out_dim: usize, seed: u64) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(RPHashError::InvalidParameter(format!(
                "projection dimensions must be positive, got {in_dim} -> {out_dim}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut neg = Vec::with_capacity(out_dim);
        let mut pos = Vec::with_capacity(out_dim);
        let expected = in_dim / 6 + 1;

        for _ in 0..out_dim {
            let mut row_neg = Vec::with_capacity(expected);
            let mut row_pos = Vec::with_capacity(expected);
            for j in 0..in_dim {
                // One draw per entry: 0 -> -1, 1 -> +1, 2..6 -> 0.
                match rng.random_range(0..6u8) {
                    0 => row_neg.push(j),
                    1 => row_pos.push(j),
                    _ => {}
                }
            }
            neg.push(row_neg);
            pos.push(row_pos);
        }

        Ok(Self {
            neg,
            pos,
            in_dim,
            out_dim,
            scale: (3.0 / out_dim as f64).sqrt(),
        })
    }

    /// Input dimension `D`.
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    /// Output dimension `d`.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// The `sqrt(3 / d)` scaling factor applied to every output coordinate.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Sign of the matrix entry at `(row, col)`: `-1`, `0`, or `+1`.
    pub fn entry(&self, row: usize, col: usize) -> i8 {
        if self.neg[row].binary_search(&col).is_ok() {
            -1
        } else if self.pos[row].binary_search(&col).is_ok() {
            1
        } else {
            0
        }
    }

    /// Project `v`, allocating the output vector.
    pub fn project(&self, v: &[f64]) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.out_dim];
        self.project_into(v, &mut out)?;
        Ok(out)
    }

    /// Project `v` into a preallocated buffer of length `out_dim`.
    ///
    /// This is the hot-path entry point; it performs no allocation.
    pub fn project_into(&self, v: &[f64], out: &mut [f64]) -> Result<()> {
        if v.len() != self.in_dim {
            return Err(RPHashError::DimensionMismatch {
                expected: self.in_dim,
                found: v.len(),
            });
        }
        debug_assert_eq!(out.len(), self.out_dim);

        for i in 0..self.out_dim {
            let mut sum = 0.0;
            for &j in &self.pos[i] {
                sum += v[j];
            }
            for &j in &self.neg[i] {
                sum -= v[j];
            }
            out[i] = self.scale * sum;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_given_seed() {
        let p1 = RandomProjection::new(30, 8, 5).unwrap();
        let p2 = RandomProjection::new(30, 8, 5).unwrap();
        let v: Vec<f64> = (0..30).map(|i| i as f64 * 0.3 - 4.0).collect();
        assert_eq!(p1.project(&v).unwrap(), p2.project(&v).unwrap());
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let p = RandomProjection::new(10, 4, 0).unwrap();
        let err = p.project(&[1.0; 9]).unwrap_err();
        assert_eq!(
            err,
            RPHashError::DimensionMismatch {
                expected: 10,
                found: 9
            }
        );
    }

    #[test]
    fn basis_vectors_hit_index_sets() {
        // Projecting e_i isolates column i: the output row is
        // scale * (1 if i in pos, -1 if i in neg, else 0).
        let p = RandomProjection::new(12, 6, 3).unwrap();
        for i in 0..12 {
            let mut e = vec![0.0; 12];
            e[i] = 1.0;
            let r = p.project(&e).unwrap();
            for row in 0..6 {
                let expected = p.scale() * f64::from(p.entry(row, i));
                assert!((r[row] - expected).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn density_roughly_one_third() {
        let p = RandomProjection::new(600, 4, 11).unwrap();
        let nonzero: usize = (0..4).map(|i| p.neg[i].len() + p.pos[i].len()).sum();
        let density = nonzero as f64 / (600.0 * 4.0);
        assert!((density - 1.0 / 3.0).abs() < 0.06, "density {density}");
    }
}
