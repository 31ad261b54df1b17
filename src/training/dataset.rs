//! Interaction pairs and training triplets.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::graph::{Graph, NodeId, NodeType};

use super::error::TrainingError;

/// A `(liquor, ingredient)` pair by external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRecord {
    pub liquor_id: NodeId,
    pub ingredient_id: NodeId,
}

/// Interaction document: known good pairings and known bad ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionData {
    pub positives: Vec<PairRecord>,
    #[serde(default)]
    pub negatives: Vec<PairRecord>,
}

/// `(anchor, positive, negative)` by node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triplet {
    pub anchor: usize,
    pub positive: usize,
    pub negative: usize,
}

/// Interactions resolved against a graph.
#[derive(Debug, Clone, Default)]
pub struct InteractionSet {
    positives: Vec<(usize, usize)>,
    bad: Vec<(usize, usize)>,
    positive_map: HashMap<usize, HashSet<usize>>,
}

impl InteractionSet {
    /// Maps external ids to indices. Pairs naming an unknown liquor or ingredient are
    /// skipped with a warning; duplicates are kept once.
    pub fn from_data(graph: &Graph, data: &InteractionData) -> Self {
        let resolve = |record: &PairRecord| {
            let liquor = graph.index_of(record.liquor_id, NodeType::Liquor);
            let ingredient = graph.index_of(record.ingredient_id, NodeType::Ingredient);
            match (liquor, ingredient) {
                (Some(l), Some(i)) => Some((l, i)),
                _ => {
                    warn!(
                        liquor_id = record.liquor_id,
                        ingredient_id = record.ingredient_id,
                        "Skipping interaction with unknown node"
                    );
                    None
                }
            }
        };

        let mut seen = HashSet::new();
        let positives: Vec<_> = data
            .positives
            .iter()
            .filter_map(resolve)
            .filter(|pair| seen.insert(*pair))
            .collect();
        let bad: Vec<_> = data.negatives.iter().filter_map(resolve).collect();

        Self::from_pairs(positives, bad)
    }

    pub fn from_pairs(positives: Vec<(usize, usize)>, bad: Vec<(usize, usize)>) -> Self {
        let mut positive_map: HashMap<usize, HashSet<usize>> = HashMap::new();
        for &(anchor, item) in &positives {
            positive_map.entry(anchor).or_default().insert(item);
        }
        debug!(
            positives = positives.len(),
            bad = bad.len(),
            anchors = positive_map.len(),
            "Interaction set resolved"
        );
        Self {
            positives,
            bad,
            positive_map,
        }
    }

    pub fn load_json<P: AsRef<Path>>(path: P, graph: &Graph) -> Result<Self, TrainingError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| TrainingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data: InteractionData = serde_json::from_slice(&bytes)?;
        Ok(Self::from_data(graph, &data))
    }

    pub fn positives(&self) -> &[(usize, usize)] {
        &self.positives
    }

    pub fn bad_pairs(&self) -> &[(usize, usize)] {
        &self.bad
    }

    /// Every known positive for every anchor, regardless of split.
    pub fn positive_map(&self) -> &HashMap<usize, HashSet<usize>> {
        &self.positive_map
    }

    pub fn is_positive(&self, anchor: usize, item: usize) -> bool {
        self.positive_map
            .get(&anchor)
            .is_some_and(|items| items.contains(&item))
    }
}

/// Train / validation / test partition of positive pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairSplit {
    pub train: Vec<(usize, usize)>,
    pub val: Vec<(usize, usize)>,
    pub test: Vec<(usize, usize)>,
}

/// Shuffles `pairs`, holds out `test_fraction` of them, then `val_fraction` of the
/// remainder. Held-out counts round down.
pub fn split_pairs<R: Rng + ?Sized>(
    pairs: &[(usize, usize)],
    test_fraction: f64,
    val_fraction: f64,
    rng: &mut R,
) -> PairSplit {
    let mut shuffled = pairs.to_vec();
    shuffled.shuffle(rng);

    let n_test = (shuffled.len() as f64 * test_fraction).floor() as usize;
    let test = shuffled.split_off(shuffled.len() - n_test);
    let n_val = (shuffled.len() as f64 * val_fraction).floor() as usize;
    let val = shuffled.split_off(shuffled.len() - n_val);

    PairSplit {
        train: shuffled,
        val,
        test,
    }
}

/// Builds triplets for one split.
///
/// Every positive yields `negative_ratio` triplets with a uniformly drawn candidate
/// that is not a known positive of the anchor. Every bad pair whose anchor has a
/// positive in `pairs` yields one more triplet with that bad item as the negative.
/// Anchors whose positives cover every candidate get no random negatives.
pub fn build_triplets<R: Rng + ?Sized>(
    set: &InteractionSet,
    pairs: &[(usize, usize)],
    candidates: &[usize],
    negative_ratio: usize,
    rng: &mut R,
) -> Vec<Triplet> {
    let mut triplets = Vec::with_capacity(pairs.len() * negative_ratio + set.bad_pairs().len());
    let empty = HashSet::new();

    for &(anchor, positive) in pairs {
        let known = set.positive_map().get(&anchor).unwrap_or(&empty);
        let eligible = super::sampler::sample_pool(candidates, known, negative_ratio, rng);
        triplets.extend(eligible.into_iter().map(|negative| Triplet {
            anchor,
            positive,
            negative,
        }));
    }

    let mut by_anchor: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(anchor, positive) in pairs {
        by_anchor.entry(anchor).or_default().push(positive);
    }
    for &(anchor, negative) in set.bad_pairs() {
        let Some(positives) = by_anchor.get(&anchor) else {
            continue;
        };
        if let Some(positive) = positives.choose(rng) {
            triplets.push(Triplet {
                anchor,
                positive: *positive,
                negative,
            });
        }
    }

    triplets
}
