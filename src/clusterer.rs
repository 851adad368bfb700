//! Two-pass clustering orchestrator.
//!
//! **Map pass**: drain the source, label every vector with
//! [`Lsh::hash_simple`], feed the sketch; the drained top-K labels survive.
//! **Reduce pass**: re-drain the source, label every vector with the blurred
//! [`Lsh::hash_stream`], accumulate each vector into the first centroid whose
//! label set matches; finish with k-means polishing over the surviving
//! centroid means.
//!
//! The source must be restartable between passes; nothing beyond the sketch,
//! the top-label set, and the centroids is ever held in memory.
//!
//! Processing is single-threaded and synchronous. A cancellation flag, when
//! installed, is checked between input items; an aborted run leaves partial
//! state behind and should be discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::centroid::Centroid;
use crate::config::{RPHashConfig, VectorPolicy};
use crate::decoder::{CubicLattice, Decoder, MultiDecoder, sample_variance};
use crate::error::{RPHashError, Result};
use crate::hash::ModulusHash;
use crate::kmeans::KMeansRefiner;
use crate::lsh::Lsh;
use crate::projection::RandomProjection;
use crate::sketch::{KhhSketch, SketchShape, TopLabels};

/// Leading vectors sampled to estimate the lattice variance when the config
/// does not pin one.
const VARIANCE_WINDOW: usize = 100;

/// Scale applied to the sampled variance before it reaches the decoder.
const VARIANCE_SCALE: f64 = 0.01;

/// A restartable stream of fixed-dimension vectors.
///
/// The clusterer drains the source twice (once per pass) and once more, up to
/// a small window, when it has to estimate the lattice variance.
pub trait VectorSource {
    /// The next vector, or `None` at end of stream.
    fn next_vector(&mut self) -> Option<&[f64]>;

    /// Rewind to the beginning of the stream.
    fn restart(&mut self);
}

/// A source over vectors materialized in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    data: Vec<Vec<f64>>,
    cursor: usize,
}

impl InMemorySource {
    pub fn new(data: Vec<Vec<f64>>) -> Self {
        Self { data, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<Vec<f64>>> for InMemorySource {
    fn from(data: Vec<Vec<f64>>) -> Self {
        Self::new(data)
    }
}

impl VectorSource for InMemorySource {
    fn next_vector(&mut self) -> Option<&[f64]> {
        let v = self.data.get(self.cursor)?;
        self.cursor += 1;
        Some(v)
    }

    fn restart(&mut self) {
        self.cursor = 0;
    }
}

/// Streaming approximate clusterer.
///
/// Owns its source, the composed LSH, and the mutable pipeline state passed
/// between passes. The projection matrix and decoder are built once from the
/// config and never mutated after the variance is seeded.
pub struct Clusterer<S> {
    config: RPHashConfig,
    k: usize,
    source: S,
    lsh: Lsh,
    cancel: Option<Arc<AtomicBool>>,
    top: Option<TopLabels>,
    centroids: Vec<Centroid>,
    centers: Option<Vec<Vec<f64>>>,
}

impl<S: VectorSource> Clusterer<S> {
    /// Build a clusterer for `k` target clusters over `source`.
    ///
    /// Fails fast on configuration errors; no data is read here.
    pub fn new(source: S, k: usize, config: RPHashConfig) -> Result<Self> {
        config.validate(k)?;
        let lsh = build_lsh(&config)?;
        Ok(Self {
            config,
            k,
            source,
            lsh,
            cancel: None,
            top: None,
            centroids: Vec::new(),
            centers: None,
        })
    }

    /// Install a cancellation flag, checked between input items.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &RPHashConfig {
        &self.config
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// The surviving top labels from the map pass, once it has run.
    pub fn top_labels(&self) -> Option<&TopLabels> {
        self.top.as_ref()
    }

    /// Execute both passes and the refinement. Idempotent once complete.
    pub fn run(&mut self) -> Result<()> {
        if self.centers.is_some() {
            return Ok(());
        }
        if self.config.variance.is_none() {
            self.seed_variance()?;
        }
        let top = self.map_pass()?;
        self.reduce_pass(&top)?;
        self.top = Some(top);
        self.refine()
    }

    /// The final `k` centroids, running the pipeline first if needed.
    pub fn centroids(&mut self) -> Result<&[Vec<f64>]> {
        if self.centers.is_none() {
            self.run()?;
        }
        Ok(self.centers.as_deref().unwrap_or_default())
    }

    fn check_cancel(&self) -> Result<()> {
        if let Some(flag) = &self.cancel
            && flag.load(Ordering::Relaxed)
        {
            return Err(RPHashError::Cancelled);
        }
        Ok(())
    }

    /// Estimate the lattice variance from the first window of input.
    fn seed_variance(&mut self) -> Result<()> {
        self.source.restart();
        let mut window: Vec<Vec<f64>> = Vec::with_capacity(VARIANCE_WINDOW);
        while window.len() < VARIANCE_WINDOW {
            self.check_cancel()?;
            let Some(v) = self.source.next_vector() else {
                break;
            };
            window.push(v.to_vec());
        }
        let variance = sample_variance(&window) * VARIANCE_SCALE;
        debug!(
            "seeded lattice variance {variance:.6e} from {} leading vectors",
            window.len()
        );
        self.lsh.set_variance(variance);
        Ok(())
    }

    fn map_pass(&mut self) -> Result<TopLabels> {
        let shape = SketchShape {
            depth: self.config.sketch_depth,
            width: self.config.effective_width(self.k),
        };
        let mut sketch = KhhSketch::with_shape(self.k, shape, self.config.random_seed)?;

        self.source.restart();
        let mut seen = 0u64;
        let mut skipped = 0u64;
        loop {
            self.check_cancel()?;
            let Some(v) = self.source.next_vector() else {
                break;
            };
            match self.lsh.hash_simple(v) {
                Ok(label) => {
                    sketch.add(label)?;
                    seen += 1;
                }
                Err(e @ RPHashError::DimensionMismatch { .. }) => {
                    match self.config.vector_policy {
                        VectorPolicy::Halt => return Err(e),
                        VectorPolicy::Skip => {
                            warn!("map pass skipping vector: {e}");
                            skipped += 1;
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let top = sketch.get_top()?;
        info!(
            "map pass: {seen} vectors ({skipped} skipped), {} surviving labels",
            top.len()
        );
        Ok(top)
    }

    fn reduce_pass(&mut self, top: &TopLabels) -> Result<()> {
        self.centroids = top
            .labels
            .iter()
            .map(|&label| Centroid::new(self.config.dimension, label))
            .collect();

        self.source.restart();
        let blurs = self.config.number_of_blurs;
        loop {
            self.check_cancel()?;
            let Some(v) = self.source.next_vector() else {
                break;
            };
            let labels = match self.lsh.hash_stream(v, blurs) {
                Ok(labels) => labels,
                Err(e @ RPHashError::DimensionMismatch { .. }) => {
                    match self.config.vector_policy {
                        VectorPolicy::Halt => return Err(e),
                        VectorPolicy::Skip => {
                            warn!("reduce pass skipping vector: {e}");
                            continue;
                        }
                    }
                }
                Err(e) => return Err(e),
            };

            // First matching label wins, in label-stream order; a vector
            // updates at most one centroid.
            'matched: for &label in &labels {
                for centroid in &mut self.centroids {
                    if centroid.matches(label) {
                        centroid.update(v)?;
                        break 'matched;
                    }
                }
            }
        }
        Ok(())
    }

    fn refine(&mut self) -> Result<()> {
        let mut points = Vec::with_capacity(self.centroids.len());
        let mut weights = Vec::with_capacity(self.centroids.len());
        for centroid in &self.centroids {
            match centroid.mean() {
                Some(mean) => {
                    points.push(mean);
                    weights.push(centroid.count());
                }
                None => debug!("dropping centroid that matched no vectors"),
            }
        }

        let mut refiner = KMeansRefiner::new(self.config.dimension, self.k)?
            .with_seed(self.config.random_seed);
        refiner.fit(&points, &weights)?;
        info!(
            "refined {} surviving centroids into {} centers",
            points.len(),
            self.k
        );
        self.centers = Some(refiner.centers().to_vec());
        Ok(())
    }
}

fn build_lsh(config: &RPHashConfig) -> Result<Lsh> {
    let projections: Vec<RandomProjection> = (0..config.number_of_projections)
        .map(|i| {
            RandomProjection::new(
                config.dimension,
                config.projected_dimension,
                config.random_seed.wrapping_add(i as u64),
            )
        })
        .collect::<Result<_>>()?;

    let variance = config.variance.unwrap_or(1.0);
    let inner_dim = config.projected_dimension / config.decoder_multiplier;
    let decoder: Box<dyn Decoder> = if config.decoder_multiplier == 1 {
        Box::new(CubicLattice::with_variance(inner_dim, variance)?)
    } else {
        Box::new(MultiDecoder::new(
            CubicLattice::with_variance(inner_dim, variance)?,
            config.decoder_multiplier,
        )?)
    };

    Lsh::new(projections, decoder, ModulusHash::new(config.hash_modulus)?)
}
