//! Negative sampling.
//!
//! Every function takes its random source explicitly, so a seeded generator
//! reproduces a run exactly.

use std::collections::HashSet;

use rand::Rng;

/// Rejection attempts per requested sample before switching to an explicit
/// eligible list.
const REJECTION_ATTEMPTS_PER_SAMPLE: usize = 16;

/// Draws `size` candidates uniformly with replacement, never returning a member of
/// `exclude`.
///
/// Returns fewer than `size` only when every candidate is excluded (then none).
pub fn sample_pool<R: Rng + ?Sized>(
    candidates: &[usize],
    exclude: &HashSet<usize>,
    size: usize,
    rng: &mut R,
) -> Vec<usize> {
    if candidates.is_empty() || size == 0 {
        return Vec::new();
    }

    let mut pool = Vec::with_capacity(size);
    let mut attempts = size * REJECTION_ATTEMPTS_PER_SAMPLE;
    while pool.len() < size && attempts > 0 {
        let candidate = candidates[rng.gen_range(0..candidates.len())];
        if !exclude.contains(&candidate) {
            pool.push(candidate);
        }
        attempts -= 1;
    }

    if pool.len() < size {
        // Dense exclusion set: sample from what is left instead.
        let eligible: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|c| !exclude.contains(c))
            .collect();
        if eligible.is_empty() {
            return Vec::new();
        }
        while pool.len() < size {
            pool.push(eligible[rng.gen_range(0..eligible.len())]);
        }
    }

    pool
}

/// Positions of the `k` highest scores, best first. Ties keep the lower position.
pub fn top_k_positions(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order.truncate(k);
    order
}

/// Picks one of the `top_k` highest-scoring pool members uniformly at random.
///
/// `scores[i]` is the current model's score for `pool[i]`. Returns `None` for an
/// empty pool.
pub fn select_hard_negative<R: Rng + ?Sized>(
    pool: &[usize],
    scores: &[f32],
    top_k: usize,
    rng: &mut R,
) -> Option<usize> {
    let len = pool.len().min(scores.len());
    if len == 0 || top_k == 0 {
        return None;
    }
    let hardest = top_k_positions(&scores[..len], top_k);
    let pick = hardest[rng.gen_range(0..hardest.len())];
    Some(pool[pick])
}
