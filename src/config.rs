//! Pipeline configuration.
//!
//! One immutable struct built before the run replaces the bag of setters the
//! pipeline stages would otherwise thread around. Mutable pipeline state (top
//! labels, centroids) lives in the orchestrator and is passed explicitly
//! between passes.

#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};

use crate::error::{RPHashError, Result};
use crate::hash::MERSENNE_PRIME;
use crate::sketch::{DEFAULT_DEPTH, k_prime};

/// What to do with an input vector whose dimension does not match the
/// configured one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
pub enum VectorPolicy {
    /// Abort the run with a dimension-mismatch error.
    #[default]
    Halt,
    /// Log a warning and skip the vector.
    Skip,
}

/// Immutable configuration for a clustering run.
///
/// Build with [`RPHashConfig::new`] and adjust fields before handing it to the
/// clusterer; validation happens at construction of the pipeline.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
pub struct RPHashConfig {
    /// Input dimension `D`. Required.
    pub dimension: usize,
    /// Projected dimension `d`. Must be divisible by `decoder_multiplier`.
    pub projected_dimension: usize,
    /// Seed for projections, sketch rows, and k-means initialization.
    pub random_seed: u64,
    /// Blur count `b` used by the reduce pass.
    pub number_of_blurs: usize,
    /// Modulus folding decoded labels; defaults to the Mersenne prime.
    pub hash_modulus: i64,
    /// Number of independent projections for multi-probe hashing.
    pub number_of_projections: usize,
    /// Concatenation factor for the lattice decoder.
    pub decoder_multiplier: usize,
    /// Sketch rows.
    pub sketch_depth: usize,
    /// Sketch buckets per row; `None` means `k'`.
    pub sketch_width: Option<usize>,
    /// Lattice variance `sigma^2`. `None` samples it from the first window of
    /// input data.
    pub variance: Option<f64>,
    /// Per-vector error policy.
    pub vector_policy: VectorPolicy,
}

impl RPHashConfig {
    /// Configuration with stock defaults for input dimension `D`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            projected_dimension: crate::decoder::CubicLattice::DEFAULT_DIM,
            random_seed: 0,
            number_of_blurs: 2,
            hash_modulus: MERSENNE_PRIME,
            number_of_projections: 2,
            decoder_multiplier: 1,
            sketch_depth: DEFAULT_DEPTH,
            sketch_width: None,
            variance: None,
            vector_policy: VectorPolicy::default(),
        }
    }

    /// Validate against a target cluster count `k`. All failures here are
    /// configuration errors, surfaced before any data is read.
    pub fn validate(&self, k: usize) -> Result<()> {
        if self.dimension == 0 {
            return Err(RPHashError::InvalidParameter(
                "dimension must be positive".to_string(),
            ));
        }
        if k == 0 {
            return Err(RPHashError::InvalidParameter(
                "k must be positive".to_string(),
            ));
        }
        if self.projected_dimension == 0 {
            return Err(RPHashError::InvalidParameter(
                "projected dimension must be positive".to_string(),
            ));
        }
        if self.decoder_multiplier == 0
            || !self.projected_dimension.is_multiple_of(self.decoder_multiplier)
        {
            return Err(RPHashError::InvalidParameter(format!(
                "projected dimension {} not divisible by decoder multiplier {}",
                self.projected_dimension, self.decoder_multiplier
            )));
        }
        if self.number_of_projections == 0 {
            return Err(RPHashError::InvalidParameter(
                "at least one projection required".to_string(),
            ));
        }
        if self.number_of_blurs == 0 {
            return Err(RPHashError::InvalidParameter(
                "at least one blur required".to_string(),
            ));
        }
        if self.hash_modulus <= 0 {
            return Err(RPHashError::InvalidParameter(format!(
                "hash modulus must be positive, got {}",
                self.hash_modulus
            )));
        }
        if self.sketch_depth == 0 {
            return Err(RPHashError::InvalidParameter(
                "sketch depth must be positive".to_string(),
            ));
        }
        let kp = k_prime(k);
        if let Some(width) = self.sketch_width
            && width < kp
        {
            return Err(RPHashError::InvalidParameter(format!(
                "sketch width {width} cannot hold top-{kp} set"
            )));
        }
        if let Some(v) = self.variance
            && (!v.is_finite() || v < 0.0)
        {
            return Err(RPHashError::InvalidParameter(format!(
                "variance must be finite and nonnegative, got {v}"
            )));
        }
        Ok(())
    }

    /// The sketch width that will actually be used for `k`.
    pub fn effective_width(&self, k: usize) -> usize {
        self.sketch_width.unwrap_or_else(|| k_prime(k))
    }
}
