use super::*;
use crate::graph::{GraphBuilder, NodeType};
use crate::model::ModelConfig;
use candle_core::Device;
use std::collections::HashSet;

fn ranked(pairs: &[(usize, f32)]) -> Vec<Ranked> {
    pairs
        .iter()
        .map(|&(idx, score)| Ranked { idx, score })
        .collect()
}

#[test]
fn test_top_k_three_candidates() {
    // A = 0, B = 1, C = 2
    let scored = ranked(&[(0, 0.90), (1, 0.20), (2, 0.50)]);

    let top = top_k(scored, 2);

    assert_eq!(top.iter().map(|r| r.idx).collect::<Vec<_>>(), vec![0, 2]);
}

#[test]
fn test_top_k_ties_break_by_index() {
    let scored = ranked(&[(7, 0.5), (3, 0.5), (5, 0.9), (1, 0.5)]);

    let top = top_k(scored, 3);

    assert_eq!(top.iter().map(|r| r.idx).collect::<Vec<_>>(), vec![5, 1, 3]);
}

#[test]
fn test_top_k_limit_larger_than_input() {
    let top = top_k(ranked(&[(0, 0.1), (1, 0.3)]), 10);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].idx, 1);
}

#[test]
fn test_top_k_zero_limit() {
    assert!(top_k(ranked(&[(0, 0.1)]), 0).is_empty());
}

#[test]
fn test_top_k_nan_ranks_last() {
    let top = top_k(ranked(&[(0, f32::NAN), (1, 0.0), (2, 0.4)]), 3);
    assert_eq!(top.iter().map(|r| r.idx).collect::<Vec<_>>(), vec![2, 1, 0]);
}

#[test]
fn test_recommend_over_model() {
    let mut builder = GraphBuilder::new().node(1, NodeType::Liquor, "Soju");
    for id in 10..30 {
        builder = builder.node(id, NodeType::Ingredient, "");
    }
    let graph = builder
        .edge(1, 10, "liqr-ingr", Some(0.9))
        .edge(10, 11, "ingr-ingr", None)
        .build()
        .unwrap();
    let device = Device::Cpu;
    let model = PairingModel::new(
        ModelConfig::new(graph.num_nodes())
            .with_embedding_dim(8)
            .with_hidden_layers(vec![8]),
        &device,
    )
    .unwrap();
    let edges = RelationalEdges::from_graph(&graph, &device, true).unwrap();
    let candidates = graph.indices_of(NodeType::Ingredient).to_vec();

    let top = recommend(&model, &edges, 0, &candidates, 5).unwrap();

    assert_eq!(top.len(), 5);
    assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
    let unique: HashSet<_> = top.iter().map(|r| r.idx).collect();
    assert_eq!(unique.len(), 5);

    // Batched ranking agrees with scoring each candidate alone.
    let single = model.score_pairs(&edges, &[0], &[top[0].idx]).unwrap();
    assert!((single[0] - top[0].score).abs() < 1e-6);

    let all = recommend(&model, &edges, 0, &candidates, 100).unwrap();
    assert_eq!(all.len(), candidates.len());
    assert_eq!(all[..5], top[..]);

    let dot = recommend_by_embedding_dot(&model, 0, &candidates, 3).unwrap();
    assert_eq!(dot.len(), 3);
    assert!(dot.iter().all(|r| (0.0..=1.0).contains(&r.score)));
}

#[test]
fn test_recommend_empty_inputs() {
    let graph = GraphBuilder::new()
        .node(1, NodeType::Liquor, "Soju")
        .build()
        .unwrap();
    let device = Device::Cpu;
    let model = PairingModel::new(
        ModelConfig::new(1).with_embedding_dim(4).with_hidden_layers(vec![4]),
        &device,
    )
    .unwrap();
    let edges = RelationalEdges::from_graph(&graph, &device, true).unwrap();

    assert!(recommend(&model, &edges, 0, &[], 5).unwrap().is_empty());
    assert!(recommend(&model, &edges, 0, &[0], 0).unwrap().is_empty());
}
