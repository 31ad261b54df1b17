use std::path::PathBuf;
use thiserror::Error;

use super::types::NodeId;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to read graph data from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse graph data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate node id {id}")]
    DuplicateNode { id: NodeId },

    #[error("edge references unknown node id {id}")]
    UnknownEndpoint { id: NodeId },

    #[error("graph has no nodes")]
    Empty,
}
