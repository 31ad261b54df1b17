use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid model configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("forward pass failed: {reason}")]
    ForwardPass { reason: String },

    #[error("node index {idx} out of range for {num_nodes} nodes")]
    IndexOutOfRange { idx: usize, num_nodes: usize },

    #[error("{backend} device unavailable: {reason}")]
    DeviceUnavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("graph has {graph_nodes} nodes but model was built for {model_nodes}")]
    GraphMismatch {
        graph_nodes: usize,
        model_nodes: usize,
    },
}

impl From<candle_core::Error> for ModelError {
    fn from(err: candle_core::Error) -> Self {
        ModelError::ForwardPass {
            reason: err.to_string(),
        }
    }
}
