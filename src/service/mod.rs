//! Serving context: graph, parameters and id maps, built once and read concurrently.
//!
//! # Start-up
//!
//! [`Service::initialize`] loads the graph, then tries checkpoints in order:
//!
//! 1. every candidate in the configured load mode;
//! 2. with fallback enabled and a strict first pass, every candidate leniently
//!    (only accepted if the embedding table itself loaded);
//! 3. with fallback enabled, [`ScoringMode::PseudoScore`].
//!
//! Without fallback, a missing checkpoint aborts start-up. An unreadable graph or
//! an embedding table sized for another graph always aborts.
//!
//! # Requests
//!
//! Requests only read shared state. The model sits behind a [`SnapshotHandle`] so
//! a retrained parameter set can be swapped in without pausing readers.
//!
//! A failed forward pass is retried as `sigmoid(dot)` over raw embedding rows and
//! labelled [`ScoreSource::EmbeddingDot`]. If that fails too, the pseudo score is
//! used when fallback is enabled; otherwise the request fails with
//! [`ServiceError::ForwardPass`].

mod error;
pub mod fallback;
pub mod state;
pub mod types;


pub use error::ServiceError;
pub use state::{ModelSnapshot, SnapshotHandle};
pub use types::{
    NodeSummary, PairingBucket, Prediction, Recommendation, ScoreSource, ScoringMode,
};

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use crate::checkpoint::{self, CheckpointError, LoadMode};
use crate::config::Config;
use crate::graph::{Graph, NodeId, NodeType};
use crate::hashing::pseudo_score;
use crate::model::{EMBEDDING_TENSOR, ModelConfig, PairingModel, RelationalEdges, select_device};
use crate::recommend::{self, Ranked};

/// Request-time behaviour independent of where the model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    pub weighted_edges: bool,
    pub fallback_enabled: bool,
    pub recommend_limit: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            weighted_edges: true,
            fallback_enabled: false,
            recommend_limit: crate::constants::DEFAULT_RECOMMEND_LIMIT,
        }
    }
}

impl From<&Config> for ServiceOptions {
    fn from(config: &Config) -> Self {
        Self {
            weighted_edges: config.weighted_edges,
            fallback_enabled: config.fallback_enabled,
            recommend_limit: config.recommend_limit,
        }
    }
}

/// Immutable-after-construction serving context.
#[derive(Debug)]
pub struct Service {
    graph: Arc<Graph>,
    edges: RelationalEdges,
    snapshot: Option<SnapshotHandle>,
    options: ServiceOptions,
}

impl Service {
    /// Builds a service from an in-memory graph and (optionally) a model.
    ///
    /// `None` selects [`ScoringMode::PseudoScore`], which requires fallback to be
    /// enabled.
    pub fn new(
        graph: Graph,
        model: Option<PairingModel>,
        options: ServiceOptions,
    ) -> Result<Self, ServiceError> {
        let device = match &model {
            Some(model) => model.device().clone(),
            None => candle_core::Device::Cpu,
        };

        if let Some(model) = &model {
            let table_rows = model.config().num_nodes;
            crate::constants::validate_node_count(graph.num_nodes(), table_rows).map_err(|_| {
                ServiceError::EmbeddingSizeMismatch {
                    graph_nodes: graph.num_nodes(),
                    table_rows,
                }
            })?;
        } else if !options.fallback_enabled {
            return Err(ServiceError::ModelUnavailable);
        }

        let edges = RelationalEdges::from_graph(&graph, &device, options.weighted_edges)?;
        Ok(Self {
            graph: Arc::new(graph),
            edges,
            snapshot: model.map(SnapshotHandle::new),
            options,
        })
    }

    /// Loads graph and checkpoint as described in the module docs.
    pub fn initialize(config: &Config) -> Result<Self, ServiceError> {
        config.validate()?;
        let graph = Graph::load_json(&config.graph_path)?;
        let device = select_device(config.device)?;

        let model_config = ModelConfig::new(graph.num_nodes())
            .with_embedding_dim(config.embedding_dim)
            .with_strategy(config.strategy);
        let model = PairingModel::new(model_config, &device)?;

        let model = match restore(&model, config) {
            Ok(()) => Some(model),
            Err(CheckpointError::EmbeddingSizeMismatch { expected, found }) => {
                return Err(ServiceError::EmbeddingSizeMismatch {
                    graph_nodes: expected,
                    table_rows: found,
                });
            }
            Err(e) if config.fallback_enabled => {
                warn!(
                    error = %e,
                    "No checkpoint could be loaded; serving labelled pseudo scores"
                );
                None
            }
            Err(e) => return Err(ServiceError::CheckpointLoad(e)),
        };

        let service = Self::new(graph, model, ServiceOptions::from(config))?;
        info!(
            mode = ?service.mode(),
            nodes = service.graph.num_nodes(),
            fallback = config.fallback_enabled,
            "Service initialized"
        );
        Ok(service)
    }

    pub fn mode(&self) -> ScoringMode {
        match self.snapshot {
            Some(_) => ScoringMode::Model,
            None => ScoringMode::PseudoScore,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn edges(&self) -> &RelationalEdges {
        &self.edges
    }

    /// Handle for publishing retrained parameters. `None` in pseudo-score mode.
    pub fn snapshot(&self) -> Option<&SnapshotHandle> {
        self.snapshot.as_ref()
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    fn resolve(&self, id: NodeId, node_type: NodeType) -> Result<usize, ServiceError> {
        self.graph
            .index_of(id, node_type)
            .ok_or(ServiceError::UnknownNode { id, node_type })
    }

    fn name_of(&self, idx: usize) -> &str {
        self.graph.node(idx).map(|n| n.name.as_str()).unwrap_or_default()
    }

    /// Compatibility of one liquor/ingredient pair with a bucketed explanation.
    #[instrument(skip(self))]
    pub fn predict(
        &self,
        liquor_id: NodeId,
        ingredient_id: NodeId,
    ) -> Result<Prediction, ServiceError> {
        let liquor = self.resolve(liquor_id, NodeType::Liquor)?;
        let ingredient = self.resolve(ingredient_id, NodeType::Ingredient)?;

        let (score, source) = match &self.snapshot {
            None => (pseudo_score(liquor_id, ingredient_id), ScoreSource::PseudoScore),
            Some(handle) => {
                let snapshot = handle.load();
                let model = snapshot.model();
                match model.score_pairs(&self.edges, &[liquor], &[ingredient]) {
                    Ok(scores) => (first_score(&scores)?, ScoreSource::Model),
                    Err(e) => {
                        warn!(error = %e, "Forward pass failed; trying embedding dot product");
                        match model.embedding_dot_scores(&[liquor], &[ingredient]) {
                            Ok(scores) => (first_score(&scores)?, ScoreSource::EmbeddingDot),
                            Err(e) => (
                                pseudo_score(liquor_id, ingredient_id),
                                self.pseudo_or_fail(e)?,
                            ),
                        }
                    }
                }
            }
        };

        let bucket = PairingBucket::from_score(score);
        Ok(Prediction {
            liquor_id,
            ingredient_id,
            score,
            bucket,
            explanation: bucket.explain(self.name_of(liquor), self.name_of(ingredient), score),
            source,
        })
    }

    /// Top ingredients for a liquor, best first.
    ///
    /// `limit` defaults to the configured limit; `Some(0)` yields an empty list.
    #[instrument(skip(self))]
    pub fn recommend(
        &self,
        liquor_id: NodeId,
        limit: Option<usize>,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let liquor = self.resolve(liquor_id, NodeType::Liquor)?;
        let limit = limit.unwrap_or(self.options.recommend_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let candidates = self.graph.indices_of(NodeType::Ingredient);

        let (ranked, source) = match &self.snapshot {
            None => (
                fallback::pseudo_ranking(&self.graph, liquor, candidates, limit),
                ScoreSource::PseudoScore,
            ),
            Some(handle) => {
                let snapshot = handle.load();
                let model = snapshot.model();
                match recommend::recommend(model, &self.edges, liquor, candidates, limit) {
                    Ok(ranked) => (ranked, ScoreSource::Model),
                    Err(e) => {
                        warn!(error = %e, "Batched forward pass failed; ranking by embedding dot product");
                        match recommend::recommend_by_embedding_dot(model, liquor, candidates, limit) {
                            Ok(ranked) => (ranked, ScoreSource::EmbeddingDot),
                            Err(e) => {
                                let source = self.pseudo_or_fail(e)?;
                                (
                                    fallback::pseudo_ranking(&self.graph, liquor, candidates, limit),
                                    source,
                                )
                            }
                        }
                    }
                }
            }
        };

        Ok(ranked
            .into_iter()
            .filter_map(|Ranked { idx, score }| {
                self.graph.node(idx).map(|node| Recommendation {
                    ingredient_id: node.id,
                    name: node.name.clone(),
                    score,
                    source,
                })
            })
            .collect())
    }

    /// `{id, name}` of every node of `node_type`, in index order.
    pub fn list_nodes(&self, node_type: NodeType) -> Vec<NodeSummary> {
        self.graph
            .indices_of(node_type)
            .iter()
            .filter_map(|&idx| self.graph.node(idx))
            .map(|node| NodeSummary {
                id: node.id,
                name: node.name.clone(),
            })
            .collect()
    }

    /// Last-resort policy once both model paths failed.
    fn pseudo_or_fail(&self, err: crate::model::ModelError) -> Result<ScoreSource, ServiceError> {
        if self.options.fallback_enabled {
            warn!(error = %err, "Embedding fallback failed; using labelled pseudo score");
            Ok(ScoreSource::PseudoScore)
        } else {
            Err(ServiceError::ForwardPass {
                reason: err.to_string(),
            })
        }
    }
}

fn first_score(scores: &[f32]) -> Result<f32, ServiceError> {
    scores.first().copied().ok_or_else(|| ServiceError::ForwardPass {
        reason: "scorer returned no output".to_string(),
    })
}

/// Checkpoint policy: configured mode first, then lenient when fallback allows it.
fn restore(model: &PairingModel, config: &Config) -> Result<(), CheckpointError> {
    let candidates = config.checkpoint_candidates();
    let first = match checkpoint::load_first(model, &candidates, config.load_mode) {
        Ok(_) => return Ok(()),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => e,
    };

    if !config.fallback_enabled || config.load_mode == LoadMode::Lenient {
        return Err(first);
    }

    warn!(error = %first, "Strict checkpoint load failed; retrying leniently");
    let (path, report) = checkpoint::load_first(model, &candidates, LoadMode::Lenient)?;
    if !report.loaded.iter().any(|name| name == EMBEDDING_TENSOR) {
        return Err(CheckpointError::MissingTensor {
            name: EMBEDDING_TENSOR.to_string(),
        });
    }
    warn!(
        path = %path.display(),
        skipped = report.skipped.len(),
        missing = report.missing.len(),
        "Serving from a partially loaded checkpoint"
    );
    Ok(())
}

/// Once-only initialisation barrier around a shared [`Service`].
///
/// Concurrent callers of [`ServiceCell::get_or_init`] all wait on the same start-up
/// and receive the same instance.
#[derive(Debug, Default)]
pub struct ServiceCell {
    cell: OnceCell<Arc<Service>>,
}

impl ServiceCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes from `config` on first call; later calls return the same service.
    pub async fn get_or_init(&self, config: &Config) -> Result<Arc<Service>, ServiceError> {
        self.cell
            .get_or_try_init(|| async {
                let config = config.clone();
                tokio::task::spawn_blocking(move || Service::initialize(&config).map(Arc::new))
                    .await
                    .map_err(|e| ServiceError::Startup {
                        reason: e.to_string(),
                    })?
            })
            .await
            .cloned()
    }

    /// Installs an already-built service (e.g. one just trained in-process).
    pub fn set(&self, service: Service) -> Result<Arc<Service>, ServiceError> {
        let service = Arc::new(service);
        self.cell
            .set(Arc::clone(&service))
            .map_err(|_| ServiceError::AlreadyInitialized)?;
        Ok(service)
    }

    pub fn get(&self) -> Option<Arc<Service>> {
        self.cell.get().cloned()
    }
}
