//! Embedding-table seeding from compound feature vectors.

use std::collections::HashMap;
use std::path::Path;

use rand::Rng;
use tracing::{debug, info};

use crate::graph::{Graph, NodeId, NodeType, Relation};
use crate::model::PairingModel;

use super::error::TrainingError;

/// Compound feature vectors keyed by compound node id.
pub type CompoundVectors = HashMap<NodeId, Vec<f32>>;

/// Reads a JSON object of `{"<compound id>": [f32, ...]}`.
pub fn load_compound_vectors<P: AsRef<Path>>(path: P) -> Result<CompoundVectors, TrainingError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| TrainingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Initial rows for every liquor and ingredient node.
///
/// A node linked through compound edges (either direction) to compounds with known
/// vectors gets their mean. Any other liquor or ingredient gets a uniform `[0, 1)`
/// vector drawn from `rng`. Compound rows are left untouched.
pub fn compound_mean_rows<R: Rng + ?Sized>(
    graph: &Graph,
    vectors: &CompoundVectors,
    dim: usize,
    rng: &mut R,
) -> Result<Vec<(usize, Vec<f32>)>, TrainingError> {
    if let Some((id, v)) = vectors.iter().find(|(_, v)| v.len() != dim) {
        return Err(TrainingError::InvalidConfig {
            reason: format!(
                "compound {} vector has {} values, embedding dim is {}",
                id,
                v.len(),
                dim
            ),
        });
    }

    let mut linked: HashMap<usize, Vec<&[f32]>> = HashMap::new();
    for edge in graph.edges_of(Relation::Compound) {
        for (node, other) in [(edge.src, edge.tgt), (edge.tgt, edge.src)] {
            let (Some(node), Some(other)) = (graph.node(node), graph.node(other)) else {
                continue;
            };
            if node.node_type == NodeType::Compound || other.node_type != NodeType::Compound {
                continue;
            }
            if let Some(v) = vectors.get(&other.id) {
                linked.entry(node.idx).or_default().push(v.as_slice());
            }
        }
    }

    let targets = graph
        .indices_of(NodeType::Liquor)
        .iter()
        .chain(graph.indices_of(NodeType::Ingredient));

    let mut rows = Vec::new();
    let mut seeded = 0usize;
    for &idx in targets {
        let row = match linked.get(&idx) {
            Some(vs) if !vs.is_empty() => {
                seeded += 1;
                let mut mean = vec![0f32; dim];
                for v in vs {
                    for (m, x) in mean.iter_mut().zip(v.iter()) {
                        *m += x;
                    }
                }
                let n = vs.len() as f32;
                mean.iter_mut().for_each(|m| *m /= n);
                mean
            }
            _ => (0..dim).map(|_| rng.r#gen::<f32>()).collect(),
        };
        rows.push((idx, row));
    }

    debug!(seeded, random = rows.len() - seeded, "Compound-mean rows computed");
    Ok(rows)
}

/// Seeds `model`'s embedding table in place.
pub fn seed_embeddings<R: Rng + ?Sized>(
    model: &PairingModel,
    graph: &Graph,
    vectors: &CompoundVectors,
    rng: &mut R,
) -> Result<usize, TrainingError> {
    let rows = compound_mean_rows(graph, vectors, model.config().embedding_dim, rng)?;
    model.set_embedding_rows(&rows)?;
    info!(rows = rows.len(), "Embedding table seeded from compound vectors");
    Ok(rows.len())
}
