//! Pairwise (BPR) training with hard-negative mining.
//!
//! ```text
//! Init -> { train epoch -> validate -> checkpoint -> early-stop check }* -> Stopped
//! ```
//!
//! - [`dataset`] resolves interaction pairs, splits them and builds triplets.
//! - [`sampler`] draws negative pools and picks hard negatives.
//! - [`init`] seeds the embedding table from compound feature vectors.
//! - [`Trainer`] runs the loop and hands finished parameters to serving.
//! - [`pipeline`] wires the above together from a [`crate::config::Config`].
//!
//! All randomness flows through a seeded [`rand::rngs::StdRng`] owned by the
//! trainer or passed in by the caller; nothing touches a global generator.

pub mod config;
pub mod dataset;
pub mod early_stopping;
mod error;
pub mod init;
pub mod pipeline;
pub mod sampler;
pub mod trainer;

#[cfg(test)]
mod tests;

pub use config::TrainerConfig;
pub use dataset::{
    InteractionData, InteractionSet, PairRecord, PairSplit, Triplet, build_triplets, split_pairs,
};
pub use early_stopping::EarlyStopping;
pub use error::TrainingError;
pub use init::{CompoundVectors, compound_mean_rows, load_compound_vectors, seed_embeddings};
pub use pipeline::TrainingOutcome;
pub use sampler::{sample_pool, select_hard_negative, top_k_positions};
pub use trainer::{
    EpochMetrics, EvalMetrics, StopReason, Trainer, TrainerState, TrainingReport, bpr_loss,
};
