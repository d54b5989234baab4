//! Error types for the mission engine.
//!
//! Engine-level problems are return-value signals so the UI can
//! degrade gracefully; only geometry that arc-length math cannot
//! process is a hard error.

use thiserror::Error;

/// Errors from the in-memory engine (geometry and cut workflow).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// A trajectory coordinate was NaN or infinite. Downstream
    /// arc-length math cannot proceed on such input.
    #[error("trajectory contains a non-finite coordinate")]
    NonFiniteCoordinate,

    /// A cut was requested before any segment exists. This indicates
    /// a caller-logic bug, not an operator-facing condition.
    #[error("no current segment to record a cut against")]
    CutWithoutSegment,
}

/// Errors from mission document import.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The document carries no segments; there is nothing to restore.
    /// The existing mission is left untouched.
    #[error("mission document contains no segments")]
    EmptySegments,

    #[error("unsupported schema tag: {0}")]
    UnsupportedSchema(String),

    #[error("malformed mission document: {0}")]
    Malformed(#[from] serde_json::Error),
}
