//! Engine-wide error taxonomy
//!
//! Degenerate geometry is recoverable (the offending primitive is skipped and
//! the operation continues); a bad context fails the whole operation; an
//! invariant violation is fatal to the job.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OffsetError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("unsupported primitive: {0}")]
    Unsupported(String),

    #[error("internal invariant violation: {0}")]
    Invariant(String),
}

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("feed rate must be positive, got {0}")]
    InvalidFeedRate(f64),

    #[error("plunge rate must be positive, got {0}")]
    InvalidPlungeRate(f64),

    #[error("tool diameter must be positive, got {0}")]
    InvalidToolDiameter(f64),

    #[error("safe Z must be non-negative, got {0}")]
    NegativeSafeZ(f64),

    #[error("travel Z must be non-negative, got {0}")]
    NegativeTravelZ(f64),

    #[error("cut depth must be negative, got {0}")]
    InvalidCutDepth(f64),

    #[error("operation has no depth levels")]
    EmptyDepthLevels,
}

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("invalid context: {0}")]
    InvalidContext(#[from] ContextError),

    #[error("internal invariant violation: {0}")]
    Invariant(String),
}

/// Non-fatal skip record surfaced beside the generated plans.
#[derive(Debug, Clone)]
pub struct SkipWarning {
    pub primitive_id: u64,
    pub reason: String,
}
