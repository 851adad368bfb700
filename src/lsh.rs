//! LSH composition: projection, then decoding, then label folding.
//!
//! Stateless beyond its owned projections and decoder (plus a scratch buffer
//! so the per-vector path does not allocate). Nearby inputs collide on the
//! same lattice cell more often than distant ones, which is the only property
//! the sketch needs.

use crate::decoder::{Decoder, LabelBuf};
use crate::error::{RPHashError, Result};
use crate::hash::ModulusHash;
use crate::projection::RandomProjection;

/// Locality-sensitive hash over one or more random projections and a lattice
/// decoder.
pub struct Lsh {
    projections: Vec<RandomProjection>,
    decoder: Box<dyn Decoder>,
    modulus: ModulusHash,
    scratch: Vec<f64>,
}

impl Lsh {
    /// Compose `projections` with `decoder`. Every projection must map the
    /// same input dimension onto the decoder's dimensionality.
    pub fn new(
        projections: Vec<RandomProjection>,
        decoder: Box<dyn Decoder>,
        modulus: ModulusHash,
    ) -> Result<Self> {
        let Some(first) = projections.first() else {
            return Err(RPHashError::InvalidParameter(
                "at least one projection required".to_string(),
            ));
        };
        let d = decoder.dimensionality();
        for p in &projections {
            if p.out_dim() != d {
                return Err(RPHashError::InvalidParameter(format!(
                    "projection output {} does not match decoder dimensionality {d}",
                    p.out_dim()
                )));
            }
            if p.in_dim() != first.in_dim() {
                return Err(RPHashError::InvalidParameter(
                    "projections disagree on input dimension".to_string(),
                ));
            }
        }

        let scratch = vec![0.0; d];
        Ok(Self { projections, decoder, modulus, scratch })
    }

    /// Input dimension accepted by every projection.
    pub fn in_dim(&self) -> usize {
        self.projections[0].in_dim()
    }

    /// Single label for `v` from the primary projection, unperturbed.
    pub fn hash_simple(&mut self, v: &[f64]) -> Result<i64> {
        self.projections[0].project_into(v, &mut self.scratch)?;
        Ok(self.modulus.hash(self.decoder.decode(&self.scratch)))
    }

    /// `blurs` labels for `v`.
    ///
    /// Blur slots are distributed round-robin across the projections and
    /// emitted projection-major, so the first label always equals
    /// [`hash_simple`](Lsh::hash_simple).
    pub fn hash_stream(&mut self, v: &[f64], blurs: usize) -> Result<LabelBuf> {
        let mut out = LabelBuf::new();
        if blurs == 0 {
            return Ok(out);
        }

        let p = self.projections.len();
        for (i, projection) in self.projections.iter().enumerate() {
            let share = blurs / p + usize::from(i < blurs % p);
            if share == 0 {
                break;
            }
            projection.project_into(v, &mut self.scratch)?;
            for label in self.decoder.decode_stream(&self.scratch, share) {
                out.push(self.modulus.hash(label));
            }
        }
        Ok(out)
    }

    /// Forward the variance hook to the decoder.
    pub fn set_variance(&mut self, variance: f64) {
        self.decoder.set_variance(variance);
    }

    pub fn variance(&self) -> f64 {
        self.decoder.variance()
    }
}
