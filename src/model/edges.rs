use candle_core::{Device, Tensor};

use crate::graph::{Edge, Graph, Relation};

use super::error::ModelError;

/// Edges of one relation, resident on the compute device.
#[derive(Debug, Clone)]
pub struct RelationBatch {
    pub relation: Relation,
    /// Source indices, `u32[E]`.
    pub src: Tensor,
    /// Target indices, `u32[E]`.
    pub tgt: Tensor,
    /// Per-edge weights, `f32[E, 1]`. `None` means every edge weighs 1.
    pub weight: Option<Tensor>,
    pub len: usize,
}

/// The graph's edges grouped per relation so each relation is transformed in one batch.
#[derive(Debug, Clone)]
pub struct RelationalEdges {
    num_nodes: usize,
    batches: Vec<RelationBatch>,
}

impl RelationalEdges {
    pub fn from_graph(graph: &Graph, device: &Device, weighted: bool) -> Result<Self, ModelError> {
        Self::from_edges(graph.num_nodes(), graph.edges(), device, weighted)
    }

    pub fn from_edges(
        num_nodes: usize,
        edges: &[Edge],
        device: &Device,
        weighted: bool,
    ) -> Result<Self, ModelError> {
        let mut batches = Vec::new();
        for relation in Relation::ALL {
            let mut src = Vec::new();
            let mut tgt = Vec::new();
            let mut weight = Vec::new();
            for edge in edges.iter().filter(|e| e.relation == relation) {
                for idx in [edge.src, edge.tgt] {
                    if idx >= num_nodes {
                        return Err(ModelError::IndexOutOfRange { idx, num_nodes });
                    }
                }
                src.push(edge.src as u32);
                tgt.push(edge.tgt as u32);
                weight.push(edge.weight);
            }
            // Relations without edges contribute nothing; skip them rather than
            // materialise empty tensors.
            if src.is_empty() {
                continue;
            }

            let len = src.len();
            let weight = if weighted {
                Some(Tensor::from_vec(weight, (len, 1), device)?)
            } else {
                None
            };
            batches.push(RelationBatch {
                relation,
                src: Tensor::from_vec(src, len, device)?,
                tgt: Tensor::from_vec(tgt, len, device)?,
                weight,
                len,
            });
        }

        Ok(Self { num_nodes, batches })
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.batches.iter().map(|b| b.len).sum()
    }

    pub fn batches(&self) -> &[RelationBatch] {
        &self.batches
    }

    pub fn is_weighted(&self) -> bool {
        self.batches.iter().all(|b| b.weight.is_some())
    }
}
