//! Error types for the dataprobe library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for dataprobe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Malformed or empty input rows. Raised before a run starts.
    #[error("Input error: {0}")]
    Input(String),

    /// Invalid configuration. Raised at construction time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single detector could not evaluate a column.
    #[error("Detector '{detector}' failed on column '{column}': {message}")]
    Detector {
        detector: String,
        column: String,
        message: String,
    },

    /// The persistence collaborator failed while committing a run.
    #[error("Commit error for run '{run_id}': {message}")]
    Commit { run_id: String, message: String },

    /// General persistence failure (load, list, abort).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Table was never registered with the coordinator.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Run id was never opened, or was already committed/aborted.
    #[error("Unknown run: {0}")]
    UnknownRun(String),

    /// Error reading or writing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProbeError {
    /// Build a detector error.
    pub fn detector(
        detector: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ProbeError::Detector {
            detector: detector.into(),
            column: column.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for dataprobe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;
