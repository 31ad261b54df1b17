//! Labelled stand-in scoring used when no model output is available.
//!
//! Everything here is a pure function of its inputs, so concurrent requests on
//! the fallback path share no state.

use crate::graph::Graph;
use crate::hashing::pseudo_score;
use crate::recommend::{Ranked, top_k};

/// Pseudo scores for `anchor` against `candidates`, ranked like model output.
pub fn pseudo_ranking(graph: &Graph, anchor: usize, candidates: &[usize], limit: usize) -> Vec<Ranked> {
    let Some(anchor) = graph.node(anchor) else {
        return Vec::new();
    };
    let scored = candidates
        .iter()
        .filter_map(|&idx| graph.node(idx))
        .map(|node| Ranked {
            idx: node.idx,
            score: pseudo_score(anchor.id, node.id),
        })
        .collect();
    top_k(scored, limit)
}
