//! rphash: streaming approximate clustering via random projection hashing.
//!
//! Given a stream of high-dimensional vectors and a target cluster count `k`,
//! the engine produces `k` approximate centroids in two passes, holding
//! nothing beyond bounded sketch state in memory:
//!
//! 1. **Map**: every vector is projected (sparse `{-1, 0, +1}` Achlioptas
//!    projection), quantized to a lattice cell label, and counted in a
//!    Count-Min sketch that tracks the `k' = ceil(k ln k)` most frequent
//!    labels.
//! 2. **Reduce**: the stream is re-read; vectors matching a surviving label
//!    (under blurred, multi-probe hashing) are averaged into per-label
//!    centroids, which a short weighted k-means polishes into `k` centers.
//!
//! # Which piece do I want?
//!
//! | Task | Entry point |
//! |------|-------------|
//! | Cluster a stream end to end | [`Clusterer`] |
//! | Heavy hitters over any `i64` stream | [`sketch::KhhSketch`] |
//! | Dimensionality reduction alone | [`projection::RandomProjection`] |
//! | Feed JSON tables in/out | [`adapter::JsonAdapter`] (`json` feature) |
//!
//! ```rust
//! use rphash::{Clusterer, InMemorySource, RPHashConfig};
//!
//! let data: Vec<Vec<f64>> = (0..200)
//!     .map(|i| {
//!         let base = if i % 2 == 0 { 0.0 } else { 100.0 };
//!         (0..16).map(|j| base + (i * 16 + j) as f64 * 1e-4).collect()
//!     })
//!     .collect();
//!
//! let config = RPHashConfig::new(16);
//! let mut clusterer = Clusterer::new(InMemorySource::new(data), 2, config)?;
//! let centers = clusterer.centroids()?;
//! assert_eq!(centers.len(), 2);
//! # Ok::<(), rphash::RPHashError>(())
//! ```
//!
//! # Guarantees and non-guarantees
//!
//! The sketch never underestimates a label's frequency, so a true heavy
//! hitter above `e/width` of the stream mass is retained with probability
//! growing in the table depth; colliding labels may be retained spuriously.
//! Clustering is approximate: no exact-assignment or optimal-k claims.
//!
//! Pipelines are single-threaded; for sharded ingestion build one
//! [`sketch::KhhSketch`] per shard from the same seed and
//! [`merge`](sketch::KhhSketch::merge) them.
//!
//! # References
//!
//! - Achlioptas (2003): "Database-friendly random projections:
//!   Johnson-Lindenstrauss with binary coins"
//! - Cormode & Muthukrishnan (2005): "An improved data stream summary:
//!   the count-min sketch and its applications"

#![forbid(unsafe_code)]

pub mod centroid;
pub mod clusterer;
pub mod config;
pub mod decoder;
pub mod error;
pub mod hash;
pub mod kmeans;
pub mod lsh;
pub mod projection;
pub mod sketch;

#[cfg(feature = "json")]
pub mod adapter;

pub use clusterer::{Clusterer, InMemorySource, VectorSource};
pub use config::{RPHashConfig, VectorPolicy};
pub use error::{RPHashError, Result};
pub use sketch::{KhhSketch, TopLabels};
