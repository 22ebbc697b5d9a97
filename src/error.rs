// error.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the historian connection and the command layers.
///
/// Per-point failures are carried as values inside outcome vectors and are
/// never propagated as early returns; only call-level failures (a whole bulk
/// request failing, a pipe refusing to open) travel through `Result`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum HistorianError {
    #[error("point {point}: {message}")]
    Point { point: String, message: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("{feature} not supported by this historian")]
    Unsupported { feature: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("data pipe is closed")]
    PipeClosed,
}

impl HistorianError {
    /// Creates a per-point error attributed to a named point
    pub fn point<T: Into<String>>(point: T, message: T) -> Self {
        Self::Point {
            point: point.into(),
            message: message.into(),
        }
    }

    /// Creates a capability-unsupported error
    pub fn unsupported<T: Into<String>>(feature: T) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    /// True when the error reports a missing server capability
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Result type alias for HistorianError
pub type Result<T> = std::result::Result<T, HistorianError>;
