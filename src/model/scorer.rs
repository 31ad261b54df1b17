//! Pair scorers over encoder output.
//!
//! Both strategies take the embedding matrix plus parallel `u32` index tensors for
//! anchors and candidates and return one logit per pair. [`Scorer::score`] applies
//! the sigmoid.

use candle_core::{D, Module, Result, Tensor};
use candle_nn::{Dropout, Linear, VarBuilder, linear};

use super::config::{ModelConfig, ScorerStrategy};

const NORM_EPS: f64 = 1e-12;

/// Row-wise L2 normalisation (`x / max(||x||, eps)`).
pub fn l2_normalize(x: &Tensor) -> Result<Tensor> {
    let norm = x.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?.maximum(NORM_EPS)?;
    x.broadcast_div(&norm)
}

/// GMF-style multiplicative branch fused with a deep MLP branch.
#[derive(Debug, Clone)]
pub struct FusionScorer {
    mlp: Vec<Linear>,
    output: Linear,
    dropout: Dropout,
}

impl FusionScorer {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let dim = config.embedding_dim;
        let mut input = dim * 2;
        let mut mlp = Vec::with_capacity(config.hidden_layer_widths.len());
        for (i, &width) in config.hidden_layer_widths.iter().enumerate() {
            mlp.push(linear(input, width, vb.pp(format!("mlp.{i}")))?);
            input = width;
        }
        let output = linear(input + dim, 1, vb.pp("output"))?;

        Ok(Self {
            mlp,
            output,
            dropout: Dropout::new(config.dropout_rate),
        })
    }

    pub fn logits(
        &self,
        embeddings: &Tensor,
        anchors: &Tensor,
        candidates: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let anchor = embeddings.index_select(anchors, 0)?;
        let candidate = embeddings.index_select(candidates, 0)?;

        let gmf = l2_normalize(&anchor)?.mul(&l2_normalize(&candidate)?)?;

        let mut deep = Tensor::cat(&[&anchor, &candidate], 1)?;
        for layer in &self.mlp {
            deep = self.dropout.forward(&layer.forward(&deep)?.relu()?, train)?;
        }

        let fused = Tensor::cat(&[&gmf, &deep], 1)?;
        self.output.forward(&fused)?.squeeze(1)
    }
}

/// Attention pooling over the `[anchor, candidate]` token pair.
///
/// A learned query attends over both tokens; the pooled context is concatenated
/// with the normalised elementwise product before the output layer.
#[derive(Debug, Clone)]
pub struct AttentionScorer {
    key: Linear,
    value: Linear,
    query: Tensor,
    output: Linear,
    dropout: Dropout,
    scale: f64,
}

impl AttentionScorer {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let dim = config.embedding_dim;
        let hidden = config.hidden_layer_widths[0];
        let key = linear(dim, hidden, vb.pp("key"))?;
        let value = linear(dim, hidden, vb.pp("value"))?;
        let query = vb.get_with_hints(
            (hidden, 1),
            "query",
            candle_nn::Init::Randn {
                mean: 0.0,
                stdev: 0.02,
            },
        )?;
        let output = linear(hidden + dim, 1, vb.pp("output"))?;

        Ok(Self {
            key,
            value,
            query,
            output,
            dropout: Dropout::new(config.dropout_rate),
            scale: 1.0 / (hidden as f64).sqrt(),
        })
    }

    pub fn logits(
        &self,
        embeddings: &Tensor,
        anchors: &Tensor,
        candidates: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let anchor = embeddings.index_select(anchors, 0)?;
        let candidate = embeddings.index_select(candidates, 0)?;

        // [B, 2, d]
        let tokens = Tensor::stack(&[&anchor, &candidate], 1)?;
        let attn = self
            .key
            .forward(&tokens)?
            .broadcast_matmul(&self.query)?
            .affine(self.scale, 0.0)?;
        let weights = candle_nn::ops::softmax(&attn, 1)?;
        let context = weights
            .broadcast_mul(&self.value.forward(&tokens)?)?
            .sum(1)?;
        let context = self.dropout.forward(&context, train)?;

        let gmf = l2_normalize(&anchor)?.mul(&l2_normalize(&candidate)?)?;
        let fused = Tensor::cat(&[&context, &gmf], 1)?;
        self.output.forward(&fused)?.squeeze(1)
    }
}

/// Strategy-selected pair scorer.
#[derive(Debug, Clone)]
pub enum Scorer {
    Fusion(FusionScorer),
    Attention(AttentionScorer),
}

impl Scorer {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        match config.strategy {
            ScorerStrategy::Fusion => Ok(Scorer::Fusion(FusionScorer::new(config, vb)?)),
            ScorerStrategy::Attention => Ok(Scorer::Attention(AttentionScorer::new(config, vb)?)),
        }
    }

    pub fn strategy(&self) -> ScorerStrategy {
        match self {
            Scorer::Fusion(_) => ScorerStrategy::Fusion,
            Scorer::Attention(_) => ScorerStrategy::Attention,
        }
    }

    /// Pre-sigmoid compatibility, `f32[B]`.
    pub fn logits(
        &self,
        embeddings: &Tensor,
        anchors: &Tensor,
        candidates: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        match self {
            Scorer::Fusion(s) => s.logits(embeddings, anchors, candidates, train),
            Scorer::Attention(s) => s.logits(embeddings, anchors, candidates, train),
        }
    }

    /// Compatibility in `[0, 1]`, `f32[B]`.
    pub fn score(
        &self,
        embeddings: &Tensor,
        anchors: &Tensor,
        candidates: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        candle_nn::ops::sigmoid(&self.logits(embeddings, anchors, candidates, train)?)
    }
}
