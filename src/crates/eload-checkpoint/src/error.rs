//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur while reading or writing a checkpoint document
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// The document on disk could not be read or replaced
    #[error("Checkpoint I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML, or a value could not be encoded
    #[error("Checkpoint serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A key path cannot be written because an ancestor holds a scalar
    #[error("Cannot write {path}: segment '{segment}' holds a non-mapping value")]
    InvalidPath { path: String, segment: String },

    /// A value exists but does not have the requested shape
    #[error("Checkpoint value at {path} has an unexpected type: {reason}")]
    TypeMismatch { path: String, reason: String },

    /// The document itself is malformed (e.g. top level is not a mapping)
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),
}

impl CheckpointError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
