//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `PAIRING_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::checkpoint::{BEST_MODEL_FILENAME, LoadMode};
use crate::constants::{DEFAULT_EMBEDDING_DIM, DEFAULT_RECOMMEND_LIMIT};
use crate::model::{DevicePreference, ScorerStrategy};

/// Service configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `PAIRING_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Graph document (JSON nodes + edges). Default: `./data/graph.json`.
    pub graph_path: PathBuf,

    /// Directory holding `best_model.safetensors` and per-epoch snapshots.
    /// Default: `./checkpoints`.
    pub checkpoint_dir: PathBuf,

    /// Extra checkpoint files tried, in order, after the canonical one.
    pub alternate_checkpoints: Vec<PathBuf>,

    /// First-pass load mode. Default: strict.
    pub load_mode: LoadMode,

    /// Allows lenient reloads and the pseudo-score path when no checkpoint loads.
    /// Default: `false`.
    pub fallback_enabled: bool,

    /// Positive/bad pair document. Training runs at start-up only when set.
    pub interactions_path: Option<PathBuf>,

    /// Compound feature vectors used to seed liquor and ingredient embeddings.
    pub compound_vectors_path: Option<PathBuf>,

    /// Default number of recommendations. Default: `10`.
    pub recommend_limit: usize,

    pub embedding_dim: usize,

    pub strategy: ScorerStrategy,

    /// Feed edge weights into message passing. Default: `true`.
    pub weighted_edges: bool,

    /// Compute backend (`auto`, `cpu`, `cuda`, `metal`). Default: `auto`.
    pub device: DevicePreference,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graph_path: PathBuf::from("./data/graph.json"),
            checkpoint_dir: PathBuf::from("./checkpoints"),
            alternate_checkpoints: Vec::new(),
            load_mode: LoadMode::Strict,
            fallback_enabled: false,
            interactions_path: None,
            compound_vectors_path: None,
            recommend_limit: DEFAULT_RECOMMEND_LIMIT,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            strategy: ScorerStrategy::default(),
            weighted_edges: true,
            device: DevicePreference::Auto,
        }
    }
}

impl Config {
    const ENV_GRAPH_PATH: &'static str = "PAIRING_GRAPH_PATH";
    const ENV_CHECKPOINT_DIR: &'static str = "PAIRING_CHECKPOINT_DIR";
    const ENV_ALTERNATE_CHECKPOINTS: &'static str = "PAIRING_ALTERNATE_CHECKPOINTS";
    const ENV_LOAD_MODE: &'static str = "PAIRING_LOAD_MODE";
    const ENV_FALLBACK: &'static str = "PAIRING_FALLBACK";
    const ENV_INTERACTIONS_PATH: &'static str = "PAIRING_INTERACTIONS_PATH";
    const ENV_COMPOUND_VECTORS_PATH: &'static str = "PAIRING_COMPOUND_VECTORS_PATH";
    const ENV_RECOMMEND_LIMIT: &'static str = "PAIRING_RECOMMEND_LIMIT";
    const ENV_EMBEDDING_DIM: &'static str = "PAIRING_EMBEDDING_DIM";
    const ENV_STRATEGY: &'static str = "PAIRING_STRATEGY";
    const ENV_WEIGHTED_EDGES: &'static str = "PAIRING_WEIGHTED_EDGES";
    const ENV_DEVICE: &'static str = "PAIRING_DEVICE";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            graph_path: parse_path_from_env(Self::ENV_GRAPH_PATH, defaults.graph_path),
            checkpoint_dir: parse_path_from_env(Self::ENV_CHECKPOINT_DIR, defaults.checkpoint_dir),
            alternate_checkpoints: parse_path_list_from_env(Self::ENV_ALTERNATE_CHECKPOINTS),
            load_mode: parse_from_env(Self::ENV_LOAD_MODE, defaults.load_mode)?,
            fallback_enabled: parse_bool_from_env(Self::ENV_FALLBACK, defaults.fallback_enabled)?,
            interactions_path: parse_optional_path_from_env(Self::ENV_INTERACTIONS_PATH),
            compound_vectors_path: parse_optional_path_from_env(Self::ENV_COMPOUND_VECTORS_PATH),
            recommend_limit: parse_from_env(Self::ENV_RECOMMEND_LIMIT, defaults.recommend_limit)?,
            embedding_dim: parse_from_env(Self::ENV_EMBEDDING_DIM, defaults.embedding_dim)?,
            strategy: parse_from_env(Self::ENV_STRATEGY, defaults.strategy)?,
            weighted_edges: parse_bool_from_env(Self::ENV_WEIGHTED_EDGES, defaults.weighted_edges)?,
            device: parse_from_env(Self::ENV_DEVICE, defaults.device)?,
        })
    }

    /// Validates paths and basic invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_file(&self.graph_path)?;

        if self.checkpoint_dir.exists() && !self.checkpoint_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.checkpoint_dir.clone(),
            });
        }

        if let Some(ref path) = self.interactions_path {
            require_file(path)?;
        }
        if let Some(ref path) = self.compound_vectors_path {
            require_file(path)?;
        }

        if self.recommend_limit == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_RECOMMEND_LIMIT,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.embedding_dim == 0 {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_EMBEDDING_DIM,
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Canonical checkpoint first, then the configured alternates.
    pub fn checkpoint_candidates(&self) -> Vec<PathBuf> {
        std::iter::once(self.checkpoint_dir.join(BEST_MODEL_FILENAME))
            .chain(self.alternate_checkpoints.iter().cloned())
            .collect()
    }
}

fn require_file(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::PathNotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(ConfigError::NotAFile {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

pub(crate) fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
    env::var(var_name).map(PathBuf::from).unwrap_or(default)
}

pub(crate) fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
    env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Comma-separated list; blank segments are dropped.
pub(crate) fn parse_path_list_from_env(var_name: &str) -> Vec<PathBuf> {
    env::var(var_name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var_name) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    name: var_name,
                    value: value.clone(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(default),
    }
}

pub(crate) fn parse_bool_from_env(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(var_name) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            "" => Ok(default),
            _ => Err(ConfigError::InvalidValue {
                name: var_name,
                value,
                reason: "expected a boolean".to_string(),
            }),
        },
        Err(_) => Ok(default),
    }
}
