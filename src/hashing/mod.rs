//! Deterministic id-pair hashing for the pseudo-score fallback.

use blake3::Hasher;

use crate::graph::NodeId;

/// Lower bound of the pseudo-score range.
pub const PSEUDO_SCORE_MIN: f32 = 0.2;

/// Upper bound of the pseudo-score range.
pub const PSEUDO_SCORE_MAX: f32 = 0.95;

/// Order-sensitive 64-bit seed for a `(liquor, ingredient)` pair.
#[inline]
pub fn pair_seed(liquor_id: NodeId, ingredient_id: NodeId) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(&liquor_id.to_le_bytes());
    hasher.update(b"|");
    hasher.update(&ingredient_id.to_le_bytes());
    first_u64(hasher.finalize().as_bytes())
}

/// Stable stand-in score in `[PSEUDO_SCORE_MIN, PSEUDO_SCORE_MAX]`.
///
/// Not a model output. Callers must label it as such.
pub fn pseudo_score(liquor_id: NodeId, ingredient_id: NodeId) -> f32 {
    // 24 bits fit an f32 mantissa exactly.
    let raw = (pair_seed(liquor_id, ingredient_id) >> 40) as f32 / ((1u64 << 24) - 1) as f32;
    (PSEUDO_SCORE_MIN + raw * (PSEUDO_SCORE_MAX - PSEUDO_SCORE_MIN)).min(PSEUDO_SCORE_MAX)
}

#[inline]
fn first_u64(bytes: &[u8; 32]) -> u64 {
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(head)
}
