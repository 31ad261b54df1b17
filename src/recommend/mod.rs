//! Batched top-K ranking of candidates for one anchor.
//!
//! The encoder runs once per call; every candidate is scored in a single scorer
//! pass over `(anchor, candidate)` pairs built by repeating the anchor index.

#[cfg(test)]
mod tests;

use std::cmp::Ordering;

use tracing::debug;

use crate::model::{ModelError, PairingModel, RelationalEdges};

/// A ranked candidate by node index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub idx: usize,
    pub score: f32,
}

/// Descending by score, then ascending by index. NaN ranks last.
fn rank_order(a: &Ranked, b: &Ranked) -> Ordering {
    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    key(b.score)
        .total_cmp(&key(a.score))
        .then(a.idx.cmp(&b.idx))
}

/// The best `limit` of `scored`, in rank order.
///
/// Returns exactly `min(limit, scored.len())` entries.
pub fn top_k(mut scored: Vec<Ranked>, limit: usize) -> Vec<Ranked> {
    if limit == 0 {
        return Vec::new();
    }
    if limit < scored.len() {
        scored.select_nth_unstable_by(limit - 1, rank_order);
        scored.truncate(limit);
    }
    scored.sort_by(rank_order);
    scored
}

/// Scores `anchor` against every candidate with the full model and keeps the best
/// `limit`.
pub fn recommend(
    model: &PairingModel,
    edges: &RelationalEdges,
    anchor: usize,
    candidates: &[usize],
    limit: usize,
) -> Result<Vec<Ranked>, ModelError> {
    if limit == 0 || candidates.is_empty() {
        return Ok(Vec::new());
    }
    let anchors = vec![anchor; candidates.len()];
    let scores = model.score_pairs(edges, &anchors, candidates)?;
    debug!(anchor, candidates = candidates.len(), limit, "Candidates scored");
    Ok(top_k(zip_ranked(candidates, &scores), limit))
}

/// Same ranking over `sigmoid(dot)` of raw embedding rows.
pub fn recommend_by_embedding_dot(
    model: &PairingModel,
    anchor: usize,
    candidates: &[usize],
    limit: usize,
) -> Result<Vec<Ranked>, ModelError> {
    if limit == 0 || candidates.is_empty() {
        return Ok(Vec::new());
    }
    let anchors = vec![anchor; candidates.len()];
    let scores = model.embedding_dot_scores(&anchors, candidates)?;
    Ok(top_k(zip_ranked(candidates, &scores), limit))
}

pub(crate) fn zip_ranked(candidates: &[usize], scores: &[f32]) -> Vec<Ranked> {
    candidates
        .iter()
        .zip(scores)
        .map(|(&idx, &score)| Ranked { idx, score })
        .collect()
}
