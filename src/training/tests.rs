use super::*;
use crate::checkpoint::{CheckpointStore, LoadMode, load_model};
use crate::graph::{Graph, GraphBuilder, NodeType};
use crate::model::{ModelConfig, PairingModel, RelationalEdges};
use candle_core::{Device, Tensor};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{HashMap, HashSet};
use tempfile::TempDir;

fn pairing_graph() -> Graph {
    let mut builder = GraphBuilder::new()
        .node(1, NodeType::Liquor, "Makgeolli")
        .node(2, NodeType::Liquor, "Cheongju");
    for id in 10..16 {
        builder = builder.node(id, NodeType::Ingredient, format!("ingredient {id}"));
    }
    builder
        .node(20, NodeType::Compound, "Ethyl hexanoate")
        .node(21, NodeType::Compound, "Linalool")
        .edge(1, 10, "liqr-ingr", Some(0.8))
        .edge(1, 11, "liqr-ingr", Some(0.6))
        .edge(2, 12, "liqr-ingr", None)
        .edge(10, 11, "ingr-ingr", Some(0.3))
        .edge(12, 13, "ingr-ingr", Some(0.2))
        .edge(10, 20, "ingr-fcomp", None)
        .edge(21, 11, "ingr-dcomp", None)
        .edge(1, 20, "ingr-fcomp", Some(0.5))
        .build()
        .unwrap()
}

fn small_model(graph: &Graph) -> PairingModel {
    let config = ModelConfig::new(graph.num_nodes())
        .with_embedding_dim(8)
        .with_hidden_layers(vec![16, 8])
        .with_num_layers(2);
    PairingModel::new(config, &Device::Cpu).unwrap()
}

fn interactions(graph: &Graph) -> InteractionSet {
    let data = InteractionData {
        positives: vec![
            PairRecord { liquor_id: 1, ingredient_id: 10 },
            PairRecord { liquor_id: 1, ingredient_id: 11 },
            PairRecord { liquor_id: 1, ingredient_id: 12 },
            PairRecord { liquor_id: 2, ingredient_id: 12 },
            PairRecord { liquor_id: 2, ingredient_id: 13 },
            PairRecord { liquor_id: 2, ingredient_id: 14 },
        ],
        negatives: vec![
            PairRecord { liquor_id: 1, ingredient_id: 15 },
            PairRecord { liquor_id: 2, ingredient_id: 15 },
        ],
    };
    InteractionSet::from_data(graph, &data)
}

fn quick_config() -> TrainerConfig {
    TrainerConfig {
        epochs: 3,
        batch_size: 4,
        pool_size: 4,
        hard_top_k: 2,
        patience: 10,
        learning_rate: 1e-2,
        ..Default::default()
    }
}

mod loss_tests {
    use super::*;

    #[test]
    fn test_bpr_loss_values() {
        let device = Device::Cpu;
        let pos = Tensor::new(&[2f32, 0.0], &device).unwrap();
        let neg = Tensor::new(&[0f32, 0.0], &device).unwrap();

        let loss = bpr_loss(&pos, &neg, 1e-10).unwrap().to_scalar::<f32>().unwrap();

        let expected = (-(1.0 / (1.0 + (-2f32).exp())).ln() + 2f32.ln()) / 2.0;
        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }

    #[test]
    fn test_bpr_loss_finite_when_negative_dominates() {
        let device = Device::Cpu;
        let pos = Tensor::new(&[-100f32], &device).unwrap();
        let neg = Tensor::new(&[100f32], &device).unwrap();

        let loss = bpr_loss(&pos, &neg, 1e-10).unwrap().to_scalar::<f32>().unwrap();

        assert!(loss.is_finite());
        assert!(loss > 20.0);
    }
}

mod sampler_tests {
    use super::*;

    #[test]
    fn test_sample_pool_excludes_positives() {
        let mut rng = StdRng::seed_from_u64(7);
        let candidates: Vec<usize> = (0..20).collect();
        let exclude: HashSet<usize> = [0, 1, 2, 3].into_iter().collect();

        let pool = sample_pool(&candidates, &exclude, 10, &mut rng);

        assert_eq!(pool.len(), 10);
        assert!(pool.iter().all(|c| !exclude.contains(c)));
    }

    #[test]
    fn test_sample_pool_dense_exclusion() {
        let mut rng = StdRng::seed_from_u64(7);
        let candidates: Vec<usize> = (0..100).collect();
        let exclude: HashSet<usize> = (0..99).collect();

        let pool = sample_pool(&candidates, &exclude, 10, &mut rng);

        assert_eq!(pool, vec![99; 10]);
    }

    #[test]
    fn test_sample_pool_everything_excluded() {
        let mut rng = StdRng::seed_from_u64(7);
        let candidates = vec![4, 5];
        let exclude: HashSet<usize> = [4, 5].into_iter().collect();

        assert!(sample_pool(&candidates, &exclude, 3, &mut rng).is_empty());
    }

    #[test]
    fn test_top_k_positions_ties_prefer_lower_position() {
        let scores = [0.5, 0.9, 0.5, 0.1, 0.9];
        assert_eq!(top_k_positions(&scores, 3), vec![1, 4, 0]);
        assert_eq!(top_k_positions(&scores, 10).len(), 5);
    }

    #[test]
    fn test_hard_negative_always_in_top_k() {
        let pool = vec![100, 101, 102, 103, 104, 105, 106, 107, 108, 109];
        let scores = [0.1, 0.95, 0.3, 0.8, 0.05, 0.7, 0.6, 0.2, 0.9, 0.4];
        let top: HashSet<usize> = [101, 108, 103, 105, 106].into_iter().collect();

        let mut seen = HashSet::new();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let chosen = select_hard_negative(&pool, &scores, 5, &mut rng).unwrap();
            assert!(top.contains(&chosen), "seed {seed} chose {chosen}");
            seen.insert(chosen);
        }
        // Uniform choice among the top-k, not always the hardest.
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_hard_negative_small_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(select_hard_negative(&[42], &[0.3], 5, &mut rng), Some(42));
        assert_eq!(select_hard_negative(&[], &[], 5, &mut rng), None);
    }

    #[test]
    fn test_same_seed_same_choice() {
        let pool = vec![1, 2, 3, 4, 5, 6];
        let scores = [0.6, 0.5, 0.4, 0.3, 0.2, 0.1];
        let pick = |seed| select_hard_negative(&pool, &scores, 3, &mut StdRng::seed_from_u64(seed));
        assert_eq!(pick(99), pick(99));
    }
}

mod early_stopping_tests {
    use super::*;

    #[test]
    fn test_stops_after_patience_non_improving_epochs() {
        let mut stopping = EarlyStopping::new(3, 0.01);

        assert!(!stopping.step(1.0));
        assert!(!stopping.step(0.995));
        assert!(!stopping.step(0.999));
        assert!(stopping.step(1.2));
        assert_eq!(stopping.best(), Some(1.0));
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut stopping = EarlyStopping::new(2, 0.0);

        stopping.step(1.0);
        stopping.step(1.1);
        assert_eq!(stopping.counter(), 1);
        stopping.step(0.8);
        assert_eq!(stopping.counter(), 0);
        assert_eq!(stopping.best(), Some(0.8));
        // Equal to the best counts as an improvement when delta is zero.
        assert!(!stopping.step(0.8));
        assert_eq!(stopping.counter(), 0);
        assert!(!stopping.step(0.9));
        assert!(stopping.step(0.85));
        assert!(stopping.should_stop());
    }

    #[test]
    fn test_drop_of_exactly_delta_is_an_improvement() {
        let mut stopping = EarlyStopping::new(1, 0.25);

        stopping.step(1.0);
        assert!(!stopping.step(0.75));
        assert_eq!(stopping.best(), Some(0.75));
        assert!(stopping.step(0.6));
    }
}

mod dataset_tests {
    use super::*;

    #[test]
    fn test_interaction_set_skips_unknown_and_duplicates() {
        let graph = pairing_graph();
        let data = InteractionData {
            positives: vec![
                PairRecord { liquor_id: 1, ingredient_id: 10 },
                PairRecord { liquor_id: 1, ingredient_id: 10 },
                PairRecord { liquor_id: 99, ingredient_id: 10 },
                // Node 10 is an ingredient, not a liquor.
                PairRecord { liquor_id: 10, ingredient_id: 11 },
            ],
            negatives: vec![PairRecord { liquor_id: 2, ingredient_id: 20 }],
        };

        let set = InteractionSet::from_data(&graph, &data);

        assert_eq!(set.positives(), &[(0, 2)]);
        assert!(set.bad_pairs().is_empty());
        assert!(set.is_positive(0, 2));
        assert!(!set.is_positive(1, 2));
    }

    #[test]
    fn test_interaction_json() {
        let json = r#"{"positives": [{"liquor_id": 2, "ingredient_id": 13}]}"#;
        let data: InteractionData = serde_json::from_str(json).unwrap();
        assert_eq!(data.positives.len(), 1);
        assert!(data.negatives.is_empty());
    }

    #[test]
    fn test_split_pairs_partitions() {
        let pairs: Vec<(usize, usize)> = (0..10).map(|i| (i, i + 100)).collect();

        let split = split_pairs(&pairs, 0.2, 0.2, &mut StdRng::seed_from_u64(42));

        assert_eq!(split.test.len(), 2);
        assert_eq!(split.val.len(), 1);
        assert_eq!(split.train.len(), 7);

        let mut all: Vec<_> = split
            .train
            .iter()
            .chain(&split.val)
            .chain(&split.test)
            .copied()
            .collect();
        all.sort();
        assert_eq!(all, pairs);

        let again = split_pairs(&pairs, 0.2, 0.2, &mut StdRng::seed_from_u64(42));
        assert_eq!(split, again);
    }

    #[test]
    fn test_build_triplets() {
        let graph = pairing_graph();
        let set = interactions(&graph);
        let candidates = graph.indices_of(NodeType::Ingredient).to_vec();
        let mut rng = StdRng::seed_from_u64(3);

        let triplets = build_triplets(&set, set.positives(), &candidates, 2, &mut rng);

        assert_eq!(triplets.len(), set.positives().len() * 2 + set.bad_pairs().len());
        for t in &triplets {
            assert!(!set.is_positive(t.anchor, t.negative), "{t:?}");
            assert!(set.is_positive(t.anchor, t.positive));
        }
        let bad_idx = graph.index_of(15, NodeType::Ingredient).unwrap();
        assert!(triplets.iter().filter(|t| t.negative == bad_idx).count() >= 2);
    }

    #[test]
    fn test_bad_pair_without_positive_is_dropped() {
        let set = InteractionSet::from_pairs(vec![(0, 2)], vec![(1, 5)]);
        let triplets = build_triplets(&set, set.positives(), &[2, 3, 4, 5], 1, &mut StdRng::seed_from_u64(0));

        assert_eq!(triplets.len(), 1);
        assert_eq!(triplets[0].anchor, 0);
    }
}

mod init_tests {
    use super::*;

    #[test]
    fn test_compound_mean_rows() {
        let graph = pairing_graph();
        let mut vectors: CompoundVectors = HashMap::new();
        vectors.insert(20, vec![1.0, 2.0]);
        vectors.insert(21, vec![3.0, 4.0]);

        let rows = compound_mean_rows(&graph, &vectors, 2, &mut StdRng::seed_from_u64(0)).unwrap();
        let row_of = |id| {
            let idx = graph.lookup(id).unwrap().idx;
            rows.iter().find(|(i, _)| *i == idx).map(|(_, r)| r.clone()).unwrap()
        };

        // Ingredient 10 links compound 20; 11 is linked from compound 21.
        assert_eq!(row_of(10), vec![1.0, 2.0]);
        assert_eq!(row_of(11), vec![3.0, 4.0]);
        // Liquor 1 links compound 20 directly.
        assert_eq!(row_of(1), vec![1.0, 2.0]);
        // No compounds: uniform [0, 1).
        assert!(row_of(15).iter().all(|x| (0.0..1.0).contains(x)));
        // 2 liquors + 6 ingredients, compounds untouched.
        assert_eq!(rows.len(), 8);
    }

    #[test]
    fn test_compound_mean_averages_multiple_links() {
        let graph = GraphBuilder::new()
            .node(1, NodeType::Ingredient, "Pear")
            .node(2, NodeType::Compound, "a")
            .node(3, NodeType::Compound, "b")
            .edge(1, 2, "ingr-fcomp", None)
            .edge(1, 3, "ingr-dcomp", None)
            .build()
            .unwrap();
        let vectors: CompoundVectors = [(2, vec![0.0, 4.0]), (3, vec![2.0, 0.0])].into_iter().collect();

        let rows = compound_mean_rows(&graph, &vectors, 2, &mut StdRng::seed_from_u64(0)).unwrap();

        assert_eq!(rows, vec![(0, vec![1.0, 2.0])]);
    }

    #[test]
    fn test_compound_vector_dimension_checked() {
        let graph = pairing_graph();
        let vectors: CompoundVectors = [(20, vec![1.0; 3])].into_iter().collect();

        let result = compound_mean_rows(&graph, &vectors, 8, &mut StdRng::seed_from_u64(0));
        assert!(matches!(result, Err(TrainingError::InvalidConfig { .. })));
    }

    #[test]
    fn test_seed_embeddings_writes_table() {
        let graph = pairing_graph();
        let model = small_model(&graph);
        let vectors: CompoundVectors = [(20, vec![0.25; 8])].into_iter().collect();

        let written = seed_embeddings(&model, &graph, &vectors, &mut StdRng::seed_from_u64(0)).unwrap();

        assert_eq!(written, 8);
        let table = model.encoder().embedding_table().to_vec2::<f32>().unwrap();
        assert_eq!(table[graph.lookup(10).unwrap().idx], vec![0.25; 8]);
    }
}

mod trainer_tests {
    use super::*;
    use crate::service::SnapshotHandle;

    fn trainer(graph: &Graph, config: TrainerConfig) -> (Trainer, Vec<Triplet>) {
        let set = interactions(graph);
        let candidates = graph.indices_of(NodeType::Ingredient).to_vec();
        let triplets = build_triplets(&set, set.positives(), &candidates, 1, &mut StdRng::seed_from_u64(5));
        let edges = RelationalEdges::from_graph(graph, &Device::Cpu, true).unwrap();
        let trainer = Trainer::new(small_model(graph), graph, edges, &set, config).unwrap();
        (trainer, triplets)
    }

    #[test]
    fn test_fit_runs_full_budget_and_checkpoints() {
        let graph = pairing_graph();
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let (trainer, triplets) = trainer(&graph, quick_config());
        let mut trainer = trainer.with_checkpoints(store.clone());
        assert_eq!(trainer.state(), TrainerState::Init);

        let report = trainer.fit(&triplets, &triplets).unwrap();

        assert_eq!(report.epochs.len(), 3);
        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(trainer.state(), TrainerState::Stopped(StopReason::Exhausted));
        for epoch in 1..=3 {
            assert!(store.epoch_path(epoch).is_file());
        }
        assert!(store.best_path().is_file());

        let lowest = report
            .epochs
            .iter()
            .map(|m| m.val_loss)
            .fold(f32::INFINITY, f32::min);
        assert_eq!(report.best_val_loss, lowest);
        assert_eq!(report.epochs[report.best_epoch - 1].val_loss, lowest);
        assert_eq!(store.manifest().unwrap().best_epoch, Some(report.best_epoch));
        for m in &report.epochs {
            assert!((0.0..=1.0).contains(&m.train_accuracy));
            assert!((0.0..=1.0).contains(&m.val_accuracy));
        }
    }

    #[test]
    fn test_fit_restores_best_parameters() {
        let graph = pairing_graph();
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let (trainer, triplets) = trainer(&graph, quick_config());
        let mut trainer = trainer.with_checkpoints(store.clone());

        trainer.fit(&triplets, &triplets).unwrap();

        let restored = small_model(&graph);
        load_model(&restored, &store.best_path(), LoadMode::Strict).unwrap();
        assert_eq!(
            restored.encoder().embedding_table().to_vec2::<f32>().unwrap(),
            trainer.model().encoder().embedding_table().to_vec2::<f32>().unwrap()
        );
    }

    #[test]
    fn test_fit_stops_early() {
        let graph = pairing_graph();
        let config = TrainerConfig {
            epochs: 20,
            patience: 2,
            min_delta: 100.0,
            ..quick_config()
        };
        let (mut trainer, triplets) = trainer(&graph, config);

        let report = trainer.fit(&triplets, &triplets).unwrap();

        assert_eq!(report.stop_reason, StopReason::EarlyStopped);
        assert_eq!(report.epochs.len(), 3);
    }

    #[test]
    fn test_evaluate_metrics() {
        let graph = pairing_graph();
        let (trainer, triplets) = trainer(&graph, quick_config());

        let metrics = trainer.evaluate(&triplets).unwrap();

        assert_eq!(metrics.count, triplets.len());
        assert!(metrics.loss.is_finite() && metrics.loss > 0.0);
        assert!((0.0..=1.0).contains(&metrics.accuracy));
        assert_eq!(metrics, trainer.evaluate(&triplets).unwrap());
    }

    #[test]
    fn test_evaluate_loss_independent_of_batch_size() {
        let graph = pairing_graph();
        let (trainer, triplets) = trainer(&graph, TrainerConfig {
            batch_size: 5,
            ..quick_config()
        });
        let eight: Vec<Triplet> = triplets.iter().cycle().take(8).copied().collect();
        let batched = trainer.evaluate(&eight).unwrap();

        let set = interactions(&graph);
        let edges = RelationalEdges::from_graph(&graph, &Device::Cpu, true).unwrap();
        let config = TrainerConfig {
            batch_size: 1000,
            ..quick_config()
        };
        let whole = Trainer::new(trainer.into_model(), &graph, edges, &set, config)
            .unwrap()
            .evaluate(&eight)
            .unwrap();

        assert!(
            (batched.loss - whole.loss).abs() < 1e-5,
            "batched={} whole={}",
            batched.loss,
            whole.loss
        );
        assert_eq!(batched.accuracy, whole.accuracy);
    }

    #[test]
    fn test_empty_sets_rejected() {
        let graph = pairing_graph();
        let (mut trainer, triplets) = trainer(&graph, quick_config());

        assert!(matches!(trainer.fit(&[], &triplets), Err(TrainingError::Empty { .. })));
        assert!(matches!(trainer.fit(&triplets, &[]), Err(TrainingError::Empty { .. })));
        assert!(matches!(trainer.evaluate(&[]), Err(TrainingError::Empty { .. })));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let graph = pairing_graph();
        let set = interactions(&graph);
        let edges = RelationalEdges::from_graph(&graph, &Device::Cpu, true).unwrap();
        let config = TrainerConfig {
            hard_top_k: 20,
            ..quick_config()
        };

        let result = Trainer::new(small_model(&graph), &graph, edges, &set, config);
        assert!(matches!(result, Err(TrainingError::InvalidConfig { .. })));
    }

    #[test]
    fn test_publish_bumps_snapshot_version() {
        let graph = pairing_graph();
        let (trainer, _) = trainer(&graph, quick_config());
        let handle = SnapshotHandle::new(trainer.model().freeze().unwrap());
        let before = handle.load();

        let version = trainer.publish(&handle).unwrap();

        assert_eq!(version, 2);
        assert_eq!(before.version(), 1);
        assert_eq!(handle.load().version(), 2);
    }
}

mod config_tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_defaults_match_reference_training_run() {
        let config = TrainerConfig::default();
        assert_eq!(config.learning_rate, 2e-4);
        assert_eq!(config.weight_decay, 1e-5);
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.hard_top_k, 5);
        assert_eq!(config.patience, 10);
        assert_eq!(config.seed, 123);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        // SAFETY: Test code only, we accept the thread-safety risk in tests.
        unsafe {
            env::set_var("PAIRING_EPOCHS", "7");
            env::set_var("PAIRING_MIN_DELTA", "0.5");
        }

        let config = TrainerConfig::from_env();

        // SAFETY: Test code only, we accept the thread-safety risk in tests.
        unsafe {
            env::remove_var("PAIRING_EPOCHS");
            env::remove_var("PAIRING_MIN_DELTA");
        }

        let config = config.unwrap();
        assert_eq!(config.epochs, 7);
        assert_eq!(config.min_delta, 0.5);
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_zero_batch() {
        // SAFETY: Test code only, we accept the thread-safety risk in tests.
        unsafe { env::set_var("PAIRING_BATCH_SIZE", "0") };

        let result = TrainerConfig::from_env();

        // SAFETY: Test code only, we accept the thread-safety risk in tests.
        unsafe { env::remove_var("PAIRING_BATCH_SIZE") };

        assert!(result.is_err());
    }
}
