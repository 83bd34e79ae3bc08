// src/error.rs
//
// Engine-level error type. Normalization and accumulation either apply a
// whole record set or fail without touching the window.

use thiserror::Error;

/// Errors raised by the telemetry engine.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Batches in one normalization call disagree on column count or identity.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The same metric key was requested with two different value shapes.
    /// This is a caller defect, not a data problem.
    #[error("shape conflict for metric '{name}': accumulator is {existing}, requested {requested}")]
    ShapeConflict {
        name: String,
        existing: &'static str,
        requested: &'static str,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
