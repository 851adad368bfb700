//! Lattice vector quantization.
//!
//! A decoder turns a projected vector into a discrete cell label. The shipped
//! decoder is a scaled cubic lattice: each coordinate is divided by the cell
//! width `sigma` and rounded, and the resulting integer cell coordinates are
//! packed into a single nonnegative `i64`.
//!
//! Decoders expose a small capability set behind the [`Decoder`] trait so the
//! pipeline stays open to other lattices (Leech, E8) without touching the
//! orchestrator.

use smallvec::SmallVec;

use crate::error::{RPHashError, Result};

/// Blurred label buffer. Inline capacity covers typical blur counts without
/// touching the heap.
pub type LabelBuf = SmallVec<[i64; 8]>;

/// Cell width floor; keeps the lattice finite when the variance hook is fed
/// degenerate data (constant window).
const MIN_CELL_WIDTH: f64 = 1e-12;

/// A vector quantizer mapping projected vectors to integer lattice cells.
pub trait Decoder {
    /// Dimension of the vectors this decoder accepts.
    fn dimensionality(&self) -> usize;

    /// Quantize `r` to a single nonnegative cell label.
    fn decode(&self, r: &[f64]) -> i64;

    /// Quantize `r` to `blurs` labels, each from a small deterministic
    /// perturbation of `r`. Blur 0 is the unperturbed label.
    fn decode_stream(&self, r: &[f64], blurs: usize) -> LabelBuf;

    /// Set the variance parameter `sigma^2` controlling the cell width.
    fn set_variance(&mut self, variance: f64);

    /// Current variance parameter.
    fn variance(&self) -> f64;
}

/// Scaled cubic (Z^d) lattice decoder.
///
/// `label = pack(round(r / sigma))` where `sigma` is the square root of the
/// configured variance.
#[derive(Debug, Clone)]
pub struct CubicLattice {
    dim: usize,
    variance: f64,
}

impl CubicLattice {
    /// Default projected dimensionality when the caller does not pick one.
    pub const DEFAULT_DIM: usize = 8;

    pub fn new(dim: usize) -> Result<Self> {
        Self::with_variance(dim, 1.0)
    }

    pub fn with_variance(dim: usize, variance: f64) -> Result<Self> {
        if dim == 0 {
            return Err(RPHashError::InvalidParameter(
                "decoder dimensionality must be positive".to_string(),
            ));
        }
        if !variance.is_finite() || variance < 0.0 {
            return Err(RPHashError::InvalidParameter(format!(
                "variance must be finite and nonnegative, got {variance}"
            )));
        }
        Ok(Self { dim, variance })
    }

    fn cell_width(&self) -> f64 {
        self.variance.sqrt().max(MIN_CELL_WIDTH)
    }

    /// Fold integer cell coordinates into a single nonnegative label.
    ///
    /// Multiply-add folding with a large odd constant; the sign bit is cleared
    /// so labels stay in `[0, 2^63)`.
    fn pack(cells: impl Iterator<Item = i64>) -> i64 {
        let mut h: i64 = 0x51ed_270b;
        for c in cells {
            h = h.wrapping_mul(0x0001_0000_01b3).wrapping_add(c);
            h ^= h >> 29;
        }
        h & i64::MAX
    }
}

impl Decoder for CubicLattice {
    fn dimensionality(&self) -> usize {
        self.dim
    }

    fn decode(&self, r: &[f64]) -> i64 {
        debug_assert_eq!(r.len(), self.dim);
        let w = self.cell_width();
        Self::pack(r.iter().map(|&x| (x / w).round() as i64))
    }

    fn decode_stream(&self, r: &[f64], blurs: usize) -> LabelBuf {
        let mut out = LabelBuf::new();
        if blurs == 0 {
            return out;
        }
        out.push(self.decode(r));

        // Blur j perturbs one coordinate by half a cell width, walking the
        // coordinates positively first, then negatively.
        let w = self.cell_width();
        for j in 1..blurs {
            let coord = (j - 1) % self.dim;
            let round = (j - 1) / self.dim;
            let sign = if round % 2 == 0 { 1.0 } else { -1.0 };
            let label = Self::pack(r.iter().enumerate().map(|(i, &x)| {
                let x = if i == coord { x + sign * w / 2.0 } else { x };
                (x / w).round() as i64
            }));
            out.push(label);
        }
        out
    }

    fn set_variance(&mut self, variance: f64) {
        self.variance = variance;
    }

    fn variance(&self) -> f64 {
        self.variance
    }
}

/// Concatenation decoder: applies an inner decoder to consecutive chunks of a
/// wider projected vector and folds the chunk labels together.
///
/// With a multiplier of 1 this is a transparent wrapper.
#[derive(Debug, Clone)]
pub struct MultiDecoder<D> {
    inner: D,
    multiplier: usize,
}

impl<D: Decoder> MultiDecoder<D> {
    pub fn new(inner: D, multiplier: usize) -> Result<Self> {
        if multiplier == 0 {
            return Err(RPHashError::InvalidParameter(
                "decoder multiplier must be positive".to_string(),
            ));
        }
        Ok(Self { inner, multiplier })
    }
}

impl<D: Decoder> Decoder for MultiDecoder<D> {
    fn dimensionality(&self) -> usize {
        self.inner.dimensionality() * self.multiplier
    }

    fn decode(&self, r: &[f64]) -> i64 {
        let chunk = self.inner.dimensionality();
        CubicLattice::pack(r.chunks_exact(chunk).map(|c| self.inner.decode(c)))
    }

    fn decode_stream(&self, r: &[f64], blurs: usize) -> LabelBuf {
        let chunk = self.inner.dimensionality();
        let per_chunk: Vec<LabelBuf> = r
            .chunks_exact(chunk)
            .map(|c| self.inner.decode_stream(c, blurs))
            .collect();

        // Combine blur-wise: blur j of the whole vector folds blur j of every
        // chunk.
        let mut out = LabelBuf::new();
        for j in 0..blurs {
            out.push(CubicLattice::pack(
                per_chunk.iter().map(|labels| labels[j]),
            ));
        }
        out
    }

    fn set_variance(&mut self, variance: f64) {
        self.inner.set_variance(variance);
    }

    fn variance(&self) -> f64 {
        self.inner.variance()
    }
}

/// Unbiased sample variance over every coordinate of a window of vectors.
///
/// Used to seed the lattice cell width from the first window of input data.
pub fn sample_variance(window: &[Vec<f64>]) -> f64 {
    let n: usize = window.iter().map(Vec::len).sum();
    if n < 2 {
        return 0.0;
    }
    let mean: f64 = window.iter().flatten().sum::<f64>() / n as f64;
    let ss: f64 = window
        .iter()
        .flatten()
        .map(|&x| (x - mean) * (x - mean))
        .sum();
    ss / (n - 1) as f64
}
