//! Test fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use pairing::config::Config;
use pairing::graph::{EdgeRecord, GraphData, NodeId, NodeRecord, NodeType};
use pairing::model::DevicePreference;
use pairing::training::{InteractionData, PairRecord, TrainerConfig};
use tempfile::TempDir;

pub const NUM_LIQUORS: NodeId = 3;
pub const NUM_INGREDIENTS: NodeId = 12;
pub const NUM_COMPOUNDS: NodeId = 4;

pub const FIRST_LIQUOR: NodeId = 1;
pub const FIRST_INGREDIENT: NodeId = 100;
pub const FIRST_COMPOUND: NodeId = 500;

pub const EMBEDDING_DIM: usize = 8;

pub fn liquor_ids() -> Vec<NodeId> {
    (0..NUM_LIQUORS).map(|i| FIRST_LIQUOR + i).collect()
}

pub fn ingredient_ids() -> Vec<NodeId> {
    (0..NUM_INGREDIENTS).map(|i| FIRST_INGREDIENT + i).collect()
}

/// Liquors, then ingredients, then compounds, so dense indices follow that order.
pub fn graph_data() -> GraphData {
    let mut nodes = Vec::new();
    for (i, id) in liquor_ids().into_iter().enumerate() {
        nodes.push(NodeRecord {
            node_id: id,
            node_type: NodeType::Liquor,
            name: format!("Liquor {i}"),
        });
    }
    for (i, id) in ingredient_ids().into_iter().enumerate() {
        nodes.push(NodeRecord {
            node_id: id,
            node_type: NodeType::Ingredient,
            name: format!("Ingredient {i}"),
        });
    }
    for i in 0..NUM_COMPOUNDS {
        nodes.push(NodeRecord {
            node_id: FIRST_COMPOUND + i,
            node_type: NodeType::Compound,
            name: format!("Compound {i}"),
        });
    }

    let mut edges = Vec::new();
    for (i, ingredient) in ingredient_ids().into_iter().enumerate() {
        let i = i as NodeId;
        edges.push(EdgeRecord {
            src: FIRST_LIQUOR + i % NUM_LIQUORS,
            tgt: ingredient,
            edge_type: "liqr-ingr".to_string(),
            score: Some(0.5 + 0.04 * i as f32),
        });
        edges.push(EdgeRecord {
            src: ingredient,
            tgt: FIRST_COMPOUND + i % NUM_COMPOUNDS,
            edge_type: "ingr-fcomp".to_string(),
            score: None,
        });
        if i > 0 {
            edges.push(EdgeRecord {
                src: ingredient - 1,
                tgt: ingredient,
                edge_type: "ingr-ingr".to_string(),
                score: Some(0.3),
            });
        }
    }

    GraphData { nodes, edges }
}

/// Each liquor likes the ingredients congruent to it mod 3 and dislikes one other.
pub fn interaction_data() -> InteractionData {
    let mut positives = Vec::new();
    let mut negatives = Vec::new();
    for (l, liquor) in liquor_ids().into_iter().enumerate() {
        for (i, ingredient) in ingredient_ids().into_iter().enumerate() {
            if i % NUM_LIQUORS as usize == l {
                positives.push(PairRecord {
                    liquor_id: liquor,
                    ingredient_id: ingredient,
                });
            }
        }
        negatives.push(PairRecord {
            liquor_id: liquor,
            ingredient_id: FIRST_INGREDIENT + (l as NodeId + 1) % NUM_LIQUORS,
        });
    }
    InteractionData {
        positives,
        negatives,
    }
}

/// One deterministic vector per compound.
pub fn compound_vectors(dim: usize) -> HashMap<NodeId, Vec<f32>> {
    (0..NUM_COMPOUNDS)
        .map(|c| {
            let vector = (0..dim)
                .map(|j| ((c as usize * dim + j) % 7) as f32 / 7.0)
                .collect();
            (FIRST_COMPOUND + c, vector)
        })
        .collect()
}

pub fn quick_trainer_config() -> TrainerConfig {
    TrainerConfig {
        epochs: 3,
        batch_size: 4,
        pool_size: 4,
        hard_top_k: 2,
        learning_rate: 1e-2,
        ..TrainerConfig::default()
    }
}

/// Files on disk plus a [`Config`] pointing at them.
pub struct Workspace {
    pub dir: TempDir,
    pub config: Config,
}

impl Workspace {
    pub fn best_checkpoint(&self) -> PathBuf {
        self.config.checkpoint_candidates()[0].clone()
    }
}

#[derive(Default)]
pub struct WorkspaceBuilder {
    fallback: Option<bool>,
    interactions: bool,
    compound_vectors: bool,
    embedding_dim: Option<usize>,
}

impl WorkspaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback(mut self, enabled: bool) -> Self {
        self.fallback = Some(enabled);
        self
    }

    pub fn with_interactions(mut self) -> Self {
        self.interactions = true;
        self
    }

    pub fn with_compound_vectors(mut self) -> Self {
        self.compound_vectors = true;
        self
    }

    pub fn embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = Some(dim);
        self
    }

    pub fn build(self) -> Workspace {
        let dir = TempDir::new().unwrap();
        let embedding_dim = self.embedding_dim.unwrap_or(EMBEDDING_DIM);

        let graph_path = dir.path().join("graph.json");
        std::fs::write(&graph_path, serde_json::to_vec(&graph_data()).unwrap()).unwrap();

        let interactions_path = self.interactions.then(|| {
            let path = dir.path().join("interactions.json");
            std::fs::write(&path, serde_json::to_vec(&interaction_data()).unwrap()).unwrap();
            path
        });

        let compound_vectors_path = self.compound_vectors.then(|| {
            let path = dir.path().join("compounds.json");
            let vectors = compound_vectors(embedding_dim);
            std::fs::write(&path, serde_json::to_vec(&vectors).unwrap()).unwrap();
            path
        });

        let config = Config {
            graph_path,
            checkpoint_dir: dir.path().join("checkpoints"),
            fallback_enabled: self.fallback.unwrap_or(false),
            interactions_path,
            compound_vectors_path,
            embedding_dim,
            device: DevicePreference::Cpu,
            ..Config::default()
        };

        Workspace { dir, config }
    }
}
