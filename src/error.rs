//! Error types for run editing

use thiserror::Error;

/// Errors that can occur while editing a run
#[derive(Debug, Error)]
pub enum EditError {
    #[error("Invalid time '{input}': {reason}")]
    InvalidTime { input: String, reason: String },

    #[error("Segment index {index} out of range for run with {len} segments")]
    SegmentOutOfRange { index: usize, len: usize },

    #[error("Cannot remove the last remaining segment")]
    LastSegment,

    #[error("A run needs at least one segment")]
    EmptyRun,

    #[error("Invalid comparison name: {0}")]
    InvalidComparisonName(String),

    #[error("A comparison named '{0}' already exists")]
    DuplicateComparison(String),

    #[error("Unknown comparison: {0}")]
    UnknownComparison(String),

    #[error("Expected {expected} segment times, got {actual}")]
    DeltaCountMismatch { expected: usize, actual: usize },

    #[error("Recency decay must be in (0, 1], got {0}")]
    InvalidDecay(f64),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl EditError {
    pub(crate) fn invalid_time(input: &str, reason: impl Into<String>) -> Self {
        EditError::InvalidTime {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
