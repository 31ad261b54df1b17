use std::path::PathBuf;
use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::graph::GraphError;
use crate::model::ModelError;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid trainer configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A split or candidate set ended up with nothing to iterate.
    #[error("{what} is empty")]
    Empty { what: &'static str },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse training data: {0}")]
    Parse(#[from] serde_json::Error),

    /// Loss or metric became NaN or infinite.
    #[error("non-finite {metric} at epoch {epoch}")]
    NonFinite { metric: &'static str, epoch: usize },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl From<candle_core::Error> for TrainingError {
    fn from(err: candle_core::Error) -> Self {
        TrainingError::Model(ModelError::from(err))
    }
}
