//! Graph encoder + pair scorer.
//!
//! - [`conv`] holds the relation-aware convolution ([`GraphLayer`], [`RelationalConv`]).
//! - [`encoder`] stacks convolutions over the trainable embedding table.
//! - [`scorer`] turns two node embeddings into a compatibility logit.
//!
//! [`PairingModel`] owns the parameters (a candle [`VarMap`]) and wires the pieces
//! together. The embedding matrix is recomputed on every call from the current
//! parameters; nothing is cached between calls.
//!
//! # Parameter Names
//!
//! Parameters are registered under stable names (`encoder.embedding.weight`,
//! `encoder.conv1.rel.0.weight`, `scorer.mlp.0.weight`, ...). Checkpoints are keyed by
//! these names, so renaming a sub-module breaks strict loading of old checkpoints.

pub mod config;
pub mod conv;
pub mod device;
pub mod edges;
pub mod encoder;
mod error;
pub mod scorer;


pub use config::{ModelConfig, ScorerStrategy};
pub use conv::{GraphLayer, RelationalConv};
pub use device::{DevicePreference, select_device};
pub use edges::{RelationBatch, RelationalEdges};
pub use encoder::GraphEncoder;
pub use error::ModelError;
pub use scorer::{AttentionScorer, FusionScorer, Scorer, l2_normalize};

use std::collections::HashMap;

use candle_core::{D, DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use tracing::debug;

/// Name of the embedding-table parameter.
pub const EMBEDDING_TENSOR: &str = "encoder.embedding.weight";

/// Encoder and scorer sharing one parameter map.
pub struct PairingModel {
    config: ModelConfig,
    varmap: VarMap,
    encoder: GraphEncoder,
    scorer: Scorer,
    device: Device,
}

impl std::fmt::Debug for PairingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingModel")
            .field("device", &format!("{:?}", self.device))
            .field("config", &self.config)
            .field("strategy", &self.scorer.strategy())
            .finish()
    }
}

impl PairingModel {
    /// Builds a freshly initialised model.
    pub fn new(config: ModelConfig, device: &Device) -> Result<Self, ModelError> {
        config.validate()?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let encoder = GraphEncoder::new(&config, vb.pp("encoder"))?;
        let scorer = Scorer::new(&config, vb.pp("scorer"))?;

        debug!(
            num_nodes = config.num_nodes,
            embedding_dim = config.embedding_dim,
            strategy = ?config.strategy,
            params = varmap.all_vars().len(),
            "Pairing model initialised"
        );

        Ok(Self {
            config,
            varmap,
            encoder,
            scorer,
            device: device.clone(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn encoder(&self) -> &GraphEncoder {
        &self.encoder
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Node embedding matrix `[num_nodes, embedding_dim]` for the current parameters.
    pub fn encode(&self, edges: &RelationalEdges, train: bool) -> Result<Tensor, ModelError> {
        if edges.num_nodes() != self.config.num_nodes {
            return Err(ModelError::GraphMismatch {
                graph_nodes: edges.num_nodes(),
                model_nodes: self.config.num_nodes,
            });
        }
        Ok(self.encoder.forward(edges, train)?)
    }

    /// Converts node indices to a device index tensor, bounds-checked.
    pub fn index_tensor(&self, indices: &[usize]) -> Result<Tensor, ModelError> {
        let num_nodes = self.config.num_nodes;
        let ids = indices
            .iter()
            .map(|&idx| {
                if idx < num_nodes {
                    Ok(idx as u32)
                } else {
                    Err(ModelError::IndexOutOfRange { idx, num_nodes })
                }
            })
            .collect::<Result<Vec<u32>, _>>()?;
        let len = ids.len();
        Ok(Tensor::from_vec(ids, len, &self.device)?)
    }

    /// Pair logits over precomputed embeddings.
    pub fn logits(
        &self,
        embeddings: &Tensor,
        anchors: &[usize],
        candidates: &[usize],
        train: bool,
    ) -> Result<Tensor, ModelError> {
        if anchors.len() != candidates.len() {
            return Err(ModelError::ForwardPass {
                reason: format!(
                    "anchor batch ({}) and candidate batch ({}) differ in length",
                    anchors.len(),
                    candidates.len()
                ),
            });
        }
        let anchors = self.index_tensor(anchors)?;
        let candidates = self.index_tensor(candidates)?;
        Ok(self
            .scorer
            .logits(embeddings, &anchors, &candidates, train)?)
    }

    /// Scores `(anchor, candidate)` pairs in evaluation mode: one encoder pass, one
    /// scorer pass over the whole batch.
    pub fn score_pairs(
        &self,
        edges: &RelationalEdges,
        anchors: &[usize],
        candidates: &[usize],
    ) -> Result<Vec<f32>, ModelError> {
        if anchors.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.encode(edges, false)?;
        let logits = self.logits(&embeddings, anchors, candidates, false)?;
        Ok(candle_nn::ops::sigmoid(&logits)?.to_vec1::<f32>()?)
    }

    /// `sigmoid(dot(e_a, e_c))` over the raw embedding table, bypassing the encoder
    /// and scorer entirely.
    pub fn embedding_dot_scores(
        &self,
        anchors: &[usize],
        candidates: &[usize],
    ) -> Result<Vec<f32>, ModelError> {
        if anchors.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.encoder.embedding_table();
        let a = table.index_select(&self.index_tensor(anchors)?, 0)?;
        let c = table.index_select(&self.index_tensor(candidates)?, 0)?;
        let dot = a.mul(&c)?.sum(D::Minus1)?;
        Ok(candle_nn::ops::sigmoid(&dot)?.to_vec1::<f32>()?)
    }

    /// Detached copies of every parameter, keyed by name.
    pub fn named_tensors(&self) -> Result<HashMap<String, Tensor>, ModelError> {
        let data = self.varmap.data().lock().map_err(|e| ModelError::ForwardPass {
            reason: format!("parameter map poisoned: {e}"),
        })?;
        data.iter()
            .map(|(name, var)| -> Result<(String, Tensor), ModelError> {
                Ok((name.clone(), var.as_tensor().detach().copy()?))
            })
            .collect()
    }

    /// Shape of every registered parameter, keyed by name.
    pub fn parameter_shapes(&self) -> Result<HashMap<String, Vec<usize>>, ModelError> {
        let data = self.varmap.data().lock().map_err(|e| ModelError::ForwardPass {
            reason: format!("parameter map poisoned: {e}"),
        })?;
        Ok(data
            .iter()
            .map(|(name, var)| (name.clone(), var.as_tensor().dims().to_vec()))
            .collect())
    }

    /// Overwrites parameters by name. Every name must exist with a matching shape.
    pub fn assign(&self, tensors: &HashMap<String, Tensor>) -> Result<(), ModelError> {
        let data = self.varmap.data().lock().map_err(|e| ModelError::ForwardPass {
            reason: format!("parameter map poisoned: {e}"),
        })?;
        for (name, tensor) in tensors {
            let var = data.get(name).ok_or_else(|| ModelError::InvalidConfig {
                reason: format!("unknown parameter {name}"),
            })?;
            var.set(tensor)?;
        }
        Ok(())
    }

    /// Deep copy with independent parameter storage.
    ///
    /// Serving holds a frozen copy so in-flight requests never observe a parameter
    /// set that training is halfway through updating.
    pub fn freeze(&self) -> Result<Self, ModelError> {
        let copy = Self::new(self.config.clone(), &self.device)?;
        copy.assign(&self.named_tensors()?)?;
        Ok(copy)
    }

    /// Replaces individual rows of the embedding table.
    pub fn set_embedding_rows(&self, rows: &[(usize, Vec<f32>)]) -> Result<(), ModelError> {
        let dim = self.config.embedding_dim;
        let num_nodes = self.config.num_nodes;
        let mut table = self
            .encoder
            .embedding_table()
            .flatten_all()?
            .to_vec1::<f32>()?;

        for (idx, row) in rows {
            if *idx >= num_nodes {
                return Err(ModelError::IndexOutOfRange {
                    idx: *idx,
                    num_nodes,
                });
            }
            if row.len() != dim {
                return Err(ModelError::InvalidConfig {
                    reason: format!(
                        "embedding row for node {} has {} values, expected {}",
                        idx,
                        row.len(),
                        dim
                    ),
                });
            }
            table[idx * dim..(idx + 1) * dim].copy_from_slice(row);
        }

        let table = Tensor::from_vec(table, (num_nodes, dim), &self.device)?;
        let mut update = HashMap::with_capacity(1);
        update.insert(EMBEDDING_TENSOR.to_string(), table);
        self.assign(&update)
    }
}
