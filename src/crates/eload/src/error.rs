//! Error types for ELOAD ingestion
//!
//! Every variant aborts the current orchestration run. Only
//! [`EloadError::StoreUnavailable`] is worth retrying, and retrying is the
//! caller's decision.

use eload_checkpoint::CheckpointError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, EloadError>;

/// Main error type for ingestion operations
#[derive(Error, Debug)]
pub enum EloadError {
    /// A required upstream fact is missing or a required resource does not exist
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The metadata store or the variant store could not be reached
    #[error("Store unavailable ({store}): {message}")]
    StoreUnavailable { store: &'static str, message: String },

    /// A store was reached but rejected the request
    #[error("Store error ({store}): {message}")]
    Store { store: &'static str, message: String },

    /// An external batch process exited non-zero
    #[error("Stage {stage} failed with exit code {}; see {}", describe_exit(exit_code), log_path.display())]
    StageExecution {
        stage: String,
        exit_code: Option<i32>,
        log_path: PathBuf,
    },

    /// Programming or configuration mistake
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The checkpoint document could not be read or written
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Filesystem error outside the checkpoint store
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A job input artifact could not be serialized
    #[error("Serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A report could not be rendered as JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The resolution service answered with something unexpected
    #[error("External service error: {0}")]
    External(String),
}

impl EloadError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn metadata_store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable {
            store: "metadata",
            message: err.to_string(),
        }
    }

    pub fn variant_store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable {
            store: "variant",
            message: err.to_string(),
        }
    }

    /// A store answered with an error that retrying will not clear
    pub fn store(store: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Store {
            store,
            message: err.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a caller may retry the operation that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (killed by signal)".to_string(),
    }
}

impl From<reqwest::Error> for EloadError {
    fn from(err: reqwest::Error) -> Self {
        Self::External(err.to_string())
    }
}
