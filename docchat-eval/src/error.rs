//! Error types for the `docchat-eval` crate.

use thiserror::Error;

/// Errors raised while loading cases or writing reports.
///
/// Per-question failures of the answering pipeline are not errors here: they
/// are captured in the run record instead.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The evaluation set is unusable.
    #[error("Invalid evaluation set: {0}")]
    InvalidSet(String),
}

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;
