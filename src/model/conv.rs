//! Relation-aware message passing.
//!
//! ```text
//! x'[t] = root(x[t]) + bias + sum over edges (s, t, r, w) of  w * W_r x[s]
//! ```
//!
//! Messages are **summed**, not averaged, so a node's signal grows with its degree
//! inside a relation. No degree normalisation happens here; the encoder applies
//! layer normalisation between layers instead.

use candle_core::{Module, Result, Tensor};
use candle_nn::{Linear, VarBuilder, linear_no_bias};

use super::edges::RelationalEdges;

/// A single message-passing step over relation-grouped edges.
pub trait GraphLayer {
    /// Maps `features[num_nodes, in]` to `[num_nodes, out]`.
    fn forward(&self, features: &Tensor, edges: &RelationalEdges) -> Result<Tensor>;
}

/// Weighted relational graph convolution (one linear map per relation, no bias).
#[derive(Debug, Clone)]
pub struct RelationalConv {
    relation_lins: Vec<Linear>,
    root: Linear,
    bias: Tensor,
}

impl RelationalConv {
    pub fn new(in_dim: usize, out_dim: usize, num_relations: usize, vb: VarBuilder) -> Result<Self> {
        let relation_lins = (0..num_relations)
            .map(|r| linear_no_bias(in_dim, out_dim, vb.pp(format!("rel.{r}"))))
            .collect::<Result<Vec<_>>>()?;
        let root = linear_no_bias(in_dim, out_dim, vb.pp("root"))?;
        let bias = vb.get_with_hints(out_dim, "bias", candle_nn::init::ZERO)?;

        Ok(Self {
            relation_lins,
            root,
            bias,
        })
    }

    pub fn num_relations(&self) -> usize {
        self.relation_lins.len()
    }

    /// `root(x) + bias`: the whole output for a node with no incoming edges.
    pub fn self_loop(&self, features: &Tensor) -> Result<Tensor> {
        self.root.forward(features)?.broadcast_add(&self.bias)
    }
}

impl GraphLayer for RelationalConv {
    fn forward(&self, features: &Tensor, edges: &RelationalEdges) -> Result<Tensor> {
        let (num_nodes, _) = features.dims2()?;
        if num_nodes != edges.num_nodes() {
            candle_core::bail!(
                "feature matrix has {} rows but edges index {} nodes",
                num_nodes,
                edges.num_nodes()
            );
        }

        let mut out = self.self_loop(features)?;
        for batch in edges.batches() {
            let code = batch.relation.code();
            let Some(lin) = self.relation_lins.get(code) else {
                candle_core::bail!(
                    "relation code {} exceeds the {} configured relations",
                    code,
                    self.relation_lins.len()
                );
            };

            let messages = lin.forward(&features.index_select(&batch.src, 0)?)?;
            let messages = match &batch.weight {
                Some(weight) => messages.broadcast_mul(weight)?,
                None => messages,
            };
            out = out.index_add(&batch.tgt, &messages, 0)?;
        }

        Ok(out)
    }
}
