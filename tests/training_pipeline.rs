//! Integration tests for the offline training run and its hand-off to serving.

mod common;

use common::fixtures::{FIRST_INGREDIENT, FIRST_LIQUOR, WorkspaceBuilder, quick_trainer_config};
use pairing::checkpoint::{CheckpointStore, LoadMode, load_model};
use pairing::graph::NodeType;
use pairing::model::{ModelConfig, PairingModel};
use pairing::service::{ScoreSource, ScoringMode, Service, ServiceOptions};
use pairing::training::{StopReason, TrainingError, pipeline};

#[test]
fn test_run_writes_checkpoints_and_manifest() {
    let workspace = WorkspaceBuilder::new().with_interactions().build();

    let outcome = pipeline::run(&workspace.config, quick_trainer_config()).unwrap();

    assert_eq!(outcome.report.epochs.len(), 3);
    assert_eq!(outcome.report.stop_reason, StopReason::Exhausted);
    assert!(outcome.test_metrics.is_some());

    let store = CheckpointStore::open(workspace.config.checkpoint_dir.clone()).unwrap();
    for epoch in 1..=3 {
        assert!(store.epoch_path(epoch).exists(), "epoch {epoch} missing");
    }
    assert!(store.best_path().exists());

    let manifest = store.manifest().unwrap();
    assert_eq!(manifest.entries.len(), 3);
    assert_eq!(manifest.best_epoch, Some(outcome.report.best_epoch));
}

#[test]
fn test_best_checkpoint_matches_returned_model() {
    let workspace = WorkspaceBuilder::new().with_interactions().build();
    let outcome = pipeline::run(&workspace.config, quick_trainer_config()).unwrap();

    let restored = PairingModel::new(
        ModelConfig::new(outcome.graph.num_nodes()).with_embedding_dim(8),
        outcome.model.device(),
    )
    .unwrap();
    let report = load_model(&restored, &workspace.best_checkpoint(), LoadMode::Strict).unwrap();
    assert!(report.is_complete());

    let trained = outcome.model.named_tensors().unwrap();
    let loaded = restored.named_tensors().unwrap();
    for (name, tensor) in &trained {
        let a = tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let b = loaded[name].flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(a, b, "{name} differs");
    }
}

#[test]
fn test_restart_serves_trained_scores() {
    let workspace = WorkspaceBuilder::new().with_interactions().build();
    let outcome = pipeline::run(&workspace.config, quick_trainer_config()).unwrap();

    let in_process = Service::new(
        outcome.graph,
        Some(outcome.model),
        ServiceOptions::from(&workspace.config),
    )
    .unwrap();
    let restarted = Service::initialize(&workspace.config).unwrap();
    assert_eq!(restarted.mode(), ScoringMode::Model);

    let a = in_process.recommend(FIRST_LIQUOR, Some(5)).unwrap();
    let b = restarted.recommend(FIRST_LIQUOR, Some(5)).unwrap();
    assert_eq!(a.len(), 5);
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.ingredient_id, y.ingredient_id);
        assert!((x.score - y.score).abs() < 1e-6);
        assert_eq!(y.source, ScoreSource::Model);
    }
}

#[test]
fn test_run_with_compound_seeding() {
    let workspace = WorkspaceBuilder::new()
        .with_interactions()
        .with_compound_vectors()
        .build();

    let outcome = pipeline::run(&workspace.config, quick_trainer_config()).unwrap();
    let service = Service::new(
        outcome.graph,
        Some(outcome.model),
        ServiceOptions::default(),
    )
    .unwrap();

    let prediction = service.predict(FIRST_LIQUOR, FIRST_INGREDIENT).unwrap();
    assert!((0.0..=1.0).contains(&prediction.score));
    assert_eq!(service.list_nodes(NodeType::Ingredient).len(), 12);
}

#[test]
fn test_run_is_reproducible_for_a_seed() {
    let first = WorkspaceBuilder::new().with_interactions().build();
    let second = WorkspaceBuilder::new().with_interactions().build();

    let a = pipeline::run(&first.config, quick_trainer_config()).unwrap();
    let b = pipeline::run(&second.config, quick_trainer_config()).unwrap();

    // Parameter init is not seeded, but the data split and triplets are.
    assert_eq!(a.report.epochs.len(), b.report.epochs.len());
    assert_eq!(
        a.test_metrics.map(|m| m.count),
        b.test_metrics.map(|m| m.count)
    );
}

#[test]
fn test_run_without_interactions() {
    let workspace = WorkspaceBuilder::new().build();

    let err = pipeline::run(&workspace.config, quick_trainer_config()).unwrap_err();
    assert!(matches!(err, TrainingError::InvalidConfig { .. }));
}

#[test]
fn test_run_rejects_mismatched_compound_vectors() {
    let mut workspace = WorkspaceBuilder::new()
        .with_interactions()
        .with_compound_vectors()
        .build();
    // Vectors were written for dim 8.
    workspace.config.embedding_dim = 16;

    assert!(pipeline::run(&workspace.config, quick_trainer_config()).is_err());
}
