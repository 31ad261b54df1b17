//! End-to-end offline training run driven by [`Config`].

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::graph::{Graph, NodeType};
use crate::model::{ModelConfig, PairingModel, RelationalEdges, select_device};

use super::config::TrainerConfig;
use super::dataset::{InteractionSet, build_triplets, split_pairs};
use super::error::TrainingError;
use super::init::{load_compound_vectors, seed_embeddings};
use super::trainer::{EvalMetrics, Trainer, TrainingReport};

/// What a finished run hands back.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub graph: Graph,
    /// Best-validation parameters.
    pub model: PairingModel,
    pub report: TrainingReport,
    /// `None` when the test split came out empty.
    pub test_metrics: Option<EvalMetrics>,
}

/// Loads the graph and interactions named by `config`, trains, and returns the
/// restored best model. Checkpoints land in `config.checkpoint_dir`.
pub fn run(config: &Config, trainer_config: TrainerConfig) -> Result<TrainingOutcome, TrainingError> {
    let Some(interactions_path) = config.interactions_path.as_ref() else {
        return Err(TrainingError::InvalidConfig {
            reason: "no interactions file configured".to_string(),
        });
    };

    let graph = Graph::load_json(&config.graph_path)?;
    let device = select_device(config.device)?;
    let edges = RelationalEdges::from_graph(&graph, &device, config.weighted_edges)?;
    let model_config = ModelConfig::new(graph.num_nodes())
        .with_embedding_dim(config.embedding_dim)
        .with_strategy(config.strategy);
    let model = PairingModel::new(model_config, &device)?;

    let mut rng = StdRng::seed_from_u64(trainer_config.seed);
    if let Some(path) = &config.compound_vectors_path {
        let vectors = load_compound_vectors(path)?;
        seed_embeddings(&model, &graph, &vectors, &mut rng)?;
    }

    let interactions = InteractionSet::load_json(interactions_path, &graph)?;
    let split = split_pairs(
        interactions.positives(),
        trainer_config.test_fraction,
        trainer_config.val_fraction,
        &mut rng,
    );
    let candidates = graph.indices_of(NodeType::Ingredient);
    let ratio = trainer_config.negative_ratio;
    let train = build_triplets(&interactions, &split.train, candidates, ratio, &mut rng);
    let val = build_triplets(&interactions, &split.val, candidates, ratio, &mut rng);
    let test = build_triplets(&interactions, &split.test, candidates, ratio, &mut rng);
    info!(
        train = train.len(),
        val = val.len(),
        test = test.len(),
        "Triplets built"
    );

    let store = CheckpointStore::open(config.checkpoint_dir.clone())?;
    let mut trainer =
        Trainer::new(model, &graph, edges, &interactions, trainer_config)?.with_checkpoints(store);
    let report = trainer.fit(&train, &val)?;

    let test_metrics = if test.is_empty() {
        None
    } else {
        let metrics = trainer.evaluate(&test)?;
        info!(
            loss = metrics.loss,
            accuracy = metrics.accuracy,
            count = metrics.count,
            "Test evaluation"
        );
        Some(metrics)
    };

    Ok(TrainingOutcome {
        graph,
        model: trainer.into_model(),
        report,
        test_metrics,
    })
}
