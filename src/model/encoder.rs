use candle_core::{D, Result, Tensor};
use candle_nn::{Dropout, Embedding, VarBuilder, embedding};

use super::config::ModelConfig;
use super::conv::{GraphLayer, RelationalConv};
use super::edges::RelationalEdges;

/// Embedding table followed by stacked [`RelationalConv`] layers.
///
/// Every layer but the last is followed by ReLU, dropout and layer norm. The last
/// layer's output is left unnormalised so the scorer sees the raw embedding scale.
#[derive(Debug, Clone)]
pub struct GraphEncoder {
    embedding: Embedding,
    layers: Vec<RelationalConv>,
    norms: Vec<Norm>,
    dropout: Dropout,
}

impl GraphEncoder {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let dim = config.embedding_dim;
        let embedding = embedding(config.num_nodes, dim, vb.pp("embedding"))?;

        let layers = (0..config.num_layers)
            .map(|i| RelationalConv::new(dim, dim, config.num_relations, vb.pp(format!("conv{}", i + 1))))
            .collect::<Result<Vec<_>>>()?;
        let norms = (0..config.num_layers - 1)
            .map(|i| Norm::new(dim, config.layer_norm_eps, vb.pp(format!("norm{}", i + 1))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            embedding,
            layers,
            norms,
            dropout: Dropout::new(config.dropout_rate),
        })
    }

    /// Runs every layer over the full embedding table.
    ///
    /// Dropout is only active when `train` is true.
    pub fn forward(&self, edges: &RelationalEdges, train: bool) -> Result<Tensor> {
        let mut x = self.embedding.embeddings().clone();
        let last = self.layers.len() - 1;

        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x, edges)?;
            if i < last {
                x = self.dropout.forward(&x.relu()?, train)?;
                x = self.norms[i].forward(&x)?;
            }
        }

        Ok(x)
    }

    /// The trainable input table, before any message passing.
    pub fn embedding_table(&self) -> &Tensor {
        self.embedding.embeddings()
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

/// Layer normalisation over the feature axis, composed from differentiable
/// primitives so gradients reach `weight` and `bias`.
#[derive(Debug, Clone)]
struct Norm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl Norm {
    fn new(dim: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get_with_hints(dim, "weight", candle_nn::init::ONE)?;
        let bias = vb.get_with_hints(dim, "bias", candle_nn::init::ZERO)?;
        Ok(Self { weight, bias, eps })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let centered = x.broadcast_sub(&x.mean_keepdim(D::Minus1)?)?;
        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        centered
            .broadcast_div(&(var + self.eps)?.sqrt()?)?
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)
    }
}
