//! Checkpoint error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::ModelError;

/// Errors raised while writing or restoring parameter snapshots.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Checkpoint file does not exist.
    #[error("checkpoint not found at {path}")]
    NotFound { path: PathBuf },

    #[error("checkpoint I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The safetensors payload could not be encoded or decoded.
    #[error("tensor serialization failed: {reason}")]
    Tensor { reason: String },

    #[error("manifest is corrupt: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Strict mode: a parameter the model expects is absent from the file.
    #[error("checkpoint is missing parameter '{name}'")]
    MissingTensor { name: String },

    /// Strict mode: the file carries a parameter the model does not have.
    #[error("checkpoint has unexpected parameter '{name}'")]
    UnexpectedTensor { name: String },

    /// Strict mode: a parameter exists in both but the shapes differ.
    #[error("parameter '{name}' has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// The embedding table was trained against a graph of a different size.
    ///
    /// Checked in every load mode.
    #[error("embedding table has {found} rows but the graph has {expected} nodes")]
    EmbeddingSizeMismatch { expected: usize, found: usize },

    /// Every candidate location failed.
    #[error("no loadable checkpoint among {} candidate(s): {}", .attempts.len(), .attempts.join("; "))]
    Exhausted { attempts: Vec<String> },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl CheckpointError {
    /// True for errors that no alternate location or load mode can fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CheckpointError::EmbeddingSizeMismatch { .. })
    }
}

impl From<candle_core::Error> for CheckpointError {
    fn from(err: candle_core::Error) -> Self {
        CheckpointError::Tensor {
            reason: err.to_string(),
        }
    }
}
