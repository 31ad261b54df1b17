use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;
use crate::graph::{GraphError, NodeId, NodeType};
use crate::model::ModelError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The id is not a node of the expected type. Client-visible not-found.
    #[error("unknown {node_type} id {id}")]
    UnknownNode { id: NodeId, node_type: NodeType },

    #[error("checkpoint load failed: {0}")]
    CheckpointLoad(#[from] CheckpointError),

    /// Model and every permitted recovery path failed for a request.
    #[error("forward pass failed: {reason}")]
    ForwardPass { reason: String },

    /// Graph data could not be read at start-up.
    #[error("graph unavailable: {0}")]
    GraphUnavailable(#[from] GraphError),

    #[error("embedding table has {table_rows} rows but the graph has {graph_nodes} nodes")]
    EmbeddingSizeMismatch {
        graph_nodes: usize,
        table_rows: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("model construction failed: {0}")]
    Model(#[from] ModelError),

    /// No model was supplied and the pseudo-score fallback is disabled.
    #[error("no model available and fallback scoring is disabled")]
    ModelUnavailable,

    #[error("service already initialized")]
    AlreadyInitialized,

    #[error("service start-up aborted: {reason}")]
    Startup { reason: String },
}

impl ServiceError {
    /// True for errors a caller should report as not-found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::UnknownNode { .. })
    }

    /// True for start-up errors that must abort the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServiceError::GraphUnavailable(_)
                | ServiceError::EmbeddingSizeMismatch { .. }
                | ServiceError::CheckpointLoad(_)
                | ServiceError::Config(_)
                | ServiceError::Model(_)
                | ServiceError::ModelUnavailable
                | ServiceError::Startup { .. }
        )
    }
}
