use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DROPOUT_RATE, DEFAULT_EMBEDDING_DIM, DEFAULT_HIDDEN_LAYER_WIDTHS,
    DEFAULT_LAYER_NORM_EPS, DEFAULT_NUM_LAYERS, NUM_RELATIONS,
};

use super::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Pair-scoring strategy applied on top of the encoder output.
pub enum ScorerStrategy {
    #[default]
    /// Multiplicative (GMF) branch fused with a deep MLP branch.
    Fusion,
    /// Attention pooling over the anchor/candidate token pair.
    Attention,
}

impl std::str::FromStr for ScorerStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fusion" | "rgcn" | "ncf" => Ok(Self::Fusion),
            "attention" => Ok(Self::Attention),
            _ => Err(format!("Unknown scorer strategy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Shape and regularisation of a [`PairingModel`](super::PairingModel).
pub struct ModelConfig {
    /// Rows of the embedding table; must equal the graph's node count.
    pub num_nodes: usize,
    pub embedding_dim: usize,
    pub num_relations: usize,
    /// Stacked convolution layers (2 or 3).
    pub num_layers: usize,
    /// Widths of the deep scorer branch, applied after the `2 * embedding_dim` input.
    pub hidden_layer_widths: Vec<usize>,
    pub dropout_rate: f32,
    pub layer_norm_eps: f64,
    pub strategy: ScorerStrategy,
}

impl ModelConfig {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            num_relations: NUM_RELATIONS,
            num_layers: DEFAULT_NUM_LAYERS,
            hidden_layer_widths: DEFAULT_HIDDEN_LAYER_WIDTHS.to_vec(),
            dropout_rate: DEFAULT_DROPOUT_RATE,
            layer_norm_eps: DEFAULT_LAYER_NORM_EPS,
            strategy: ScorerStrategy::default(),
        }
    }

    pub fn with_embedding_dim(mut self, embedding_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }

    pub fn with_hidden_layers(mut self, widths: Vec<usize>) -> Self {
        self.hidden_layer_widths = widths;
        self
    }

    pub fn with_num_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn with_dropout(mut self, dropout_rate: f32) -> Self {
        self.dropout_rate = dropout_rate;
        self
    }

    pub fn with_strategy(mut self, strategy: ScorerStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |reason: String| Err(ModelError::InvalidConfig { reason });

        if self.num_nodes == 0 {
            return invalid("num_nodes must be positive".to_string());
        }
        if self.embedding_dim == 0 {
            return invalid("embedding_dim must be positive".to_string());
        }
        if self.num_relations == 0 {
            return invalid("num_relations must be positive".to_string());
        }
        if !(2..=3).contains(&self.num_layers) {
            return invalid(format!(
                "num_layers must be 2 or 3, got {}",
                self.num_layers
            ));
        }
        if self.hidden_layer_widths.is_empty() || self.hidden_layer_widths.contains(&0) {
            return invalid("hidden_layer_widths must be non-empty and non-zero".to_string());
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return invalid(format!(
                "dropout_rate must be in [0, 1), got {}",
                self.dropout_rate
            ));
        }
        Ok(())
    }
}
