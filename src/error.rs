//! Error types for rphash.

use thiserror::Error;

/// Errors that can occur while configuring or running the clustering pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RPHashError {
    /// Empty input stream (no vectors to cluster).
    #[error("input stream is empty")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between the configured dimension and an input vector.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The sketch's top-K state has been drained; no further mutation allowed.
    #[error("sketch already drained: {0}")]
    SketchDrained(&'static str),

    /// Two sketches cannot be merged (different shape or hash coefficients).
    #[error("sketch merge mismatch: {0}")]
    MergeMismatch(&'static str),

    /// Clustering run aborted through the cancellation flag.
    #[error("clustering cancelled")]
    Cancelled,

    /// Other error (for extensibility).
    #[error("{0}")]
    Other(String),
}

/// Result type alias for rphash operations.
pub type Result<T> = std::result::Result<T, RPHashError>;
