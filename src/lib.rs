//! Pairing library crate (used by the binary, benches and integration tests).
//!
//! # Public API Surface
//!
//! ## Graph & Model
//! - [`Graph`], [`GraphBuilder`] - Heterogeneous liquor / ingredient / compound graph
//! - [`PairingModel`], [`ModelConfig`] - Relational encoder plus pair scorer
//! - [`RelationalEdges`] - Per-relation edge tensors on the compute device
//!
//! ## Training
//! - [`Trainer`], [`TrainerConfig`] - BPR loop with hard-negative mining
//! - [`InteractionSet`] - Resolved positive / bad pairs
//! - [`CheckpointStore`] - Per-epoch and canonical parameter snapshots
//!
//! ## Serving
//! - [`Service`], [`ServiceCell`] - Read-only serving context with labelled fallbacks
//! - [`Prediction`], [`Recommendation`] - Request results
//!
//! ## Utilities
//! - [`recommend::top_k`] - Deterministic top-K selection
//! - [`hashing::pseudo_score`] - Stable stand-in score for fallback mode

pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod graph;
pub mod hashing;
pub mod model;
pub mod recommend;
pub mod service;
pub mod training;

pub use checkpoint::{CheckpointError, CheckpointStore, LoadMode, LoadReport};
pub use config::{Config, ConfigError};
pub use constants::{DimValidationError, validate_node_count};
pub use graph::{Graph, GraphBuilder, GraphError, NodeId, NodeType, Relation};
pub use hashing::{pair_seed, pseudo_score};
pub use model::{
    DevicePreference, ModelConfig, ModelError, PairingModel, RelationalEdges, ScorerStrategy,
};
pub use recommend::Ranked;
pub use service::{
    NodeSummary, PairingBucket, Prediction, Recommendation, ScoreSource, ScoringMode, Service,
    ServiceCell, ServiceError, ServiceOptions,
};
pub use training::{InteractionSet, Trainer, TrainerConfig, TrainingError, TrainingReport};
