//! Parameter snapshots on disk.
//!
//! A checkpoint directory holds one safetensors file per saved epoch
//! (`epoch_{n}.safetensors`), the canonical `best_model.safetensors`, and a JSON
//! [`Manifest`] describing both. The canonical file is replaced whenever a better
//! epoch appears. Training again into the same directory overwrites
//! `epoch_{n}.safetensors` and its manifest entry, so the manifest always lists
//! exactly one entry per epoch file on disk.
//!
//! # Load Modes
//!
//! - [`LoadMode::Strict`]: every model parameter must be present with its exact
//!   shape, and the file may not carry extra parameters.
//! - [`LoadMode::Lenient`]: matching parameters are loaded; missing, extra or
//!   mis-shaped ones are skipped and listed in the [`LoadReport`].
//!
//! The embedding table is checked against the model's node count in both modes.
//! A mismatch there means the checkpoint belongs to a different graph.

pub mod error;
pub mod manifest;


pub use error::CheckpointError;
pub use manifest::{Manifest, ManifestEntry};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use candle_core::Tensor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::{EMBEDDING_TENSOR, PairingModel};

/// File name of the canonical (best validation loss) snapshot.
pub const BEST_MODEL_FILENAME: &str = "best_model.safetensors";

pub const MANIFEST_FILENAME: &str = "manifest.json";

/// File name for the snapshot taken after `epoch`.
pub fn epoch_filename(epoch: usize) -> String {
    format!("epoch_{epoch}.safetensors")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    #[default]
    Strict,
    Lenient,
}

impl std::str::FromStr for LoadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            _ => Err(format!("Unknown load mode: {}", s)),
        }
    }
}

impl std::fmt::Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadMode::Strict => write!(f, "strict"),
            LoadMode::Lenient => write!(f, "lenient"),
        }
    }
}

/// What a load actually applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub mode: LoadMode,
    pub loaded: Vec<String>,
    /// Present in both but shaped differently.
    pub skipped: Vec<String>,
    /// Expected by the model, absent from the file.
    pub missing: Vec<String>,
    /// Present in the file, unknown to the model.
    pub unexpected: Vec<String>,
}

impl LoadReport {
    /// True when every model parameter came from the file.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.missing.is_empty()
    }
}

/// Writes every model parameter to `path` as safetensors.
pub fn save_model(model: &PairingModel, path: &Path) -> Result<(), CheckpointError> {
    let tensors = model.named_tensors()?;
    save_tensors(&tensors, path)
}

pub fn save_tensors(tensors: &HashMap<String, Tensor>, path: &Path) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CheckpointError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    candle_core::safetensors::save(tensors, path)?;
    debug!(path = %path.display(), tensors = tensors.len(), "Checkpoint written");
    Ok(())
}

/// Restores parameters from `path` into `model`.
pub fn load_model(
    model: &PairingModel,
    path: &Path,
    mode: LoadMode,
) -> Result<LoadReport, CheckpointError> {
    if !path.is_file() {
        return Err(CheckpointError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let stored = candle_core::safetensors::load(path, model.device())?;
    apply(model, stored, mode)
}

/// Applies named tensors to `model` under `mode`.
pub fn apply(
    model: &PairingModel,
    stored: HashMap<String, Tensor>,
    mode: LoadMode,
) -> Result<LoadReport, CheckpointError> {
    let num_nodes = model.config().num_nodes;
    if let Some(table) = stored.get(EMBEDDING_TENSOR) {
        let rows = table.dims().first().copied().unwrap_or(0);
        if rows != num_nodes {
            return Err(CheckpointError::EmbeddingSizeMismatch {
                expected: num_nodes,
                found: rows,
            });
        }
    }

    let shapes = model.parameter_shapes()?;
    let mut report = LoadReport {
        mode,
        ..Default::default()
    };
    let mut accepted = HashMap::with_capacity(shapes.len());

    let mut expected: Vec<_> = shapes.iter().collect();
    expected.sort_by(|a, b| a.0.cmp(b.0));
    for (name, shape) in expected {
        match stored.get(name) {
            None => {
                if mode == LoadMode::Strict {
                    return Err(CheckpointError::MissingTensor { name: name.clone() });
                }
                report.missing.push(name.clone());
            }
            Some(tensor) if tensor.dims() != shape.as_slice() => {
                if mode == LoadMode::Strict {
                    return Err(CheckpointError::ShapeMismatch {
                        name: name.clone(),
                        expected: shape.clone(),
                        found: tensor.dims().to_vec(),
                    });
                }
                report.skipped.push(name.clone());
            }
            Some(tensor) => {
                accepted.insert(name.clone(), tensor.to_dtype(candle_core::DType::F32)?);
                report.loaded.push(name.clone());
            }
        }
    }

    let mut unexpected: Vec<_> = stored
        .keys()
        .filter(|name| !shapes.contains_key(*name))
        .cloned()
        .collect();
    unexpected.sort();
    if mode == LoadMode::Strict {
        if let Some(name) = unexpected.into_iter().next() {
            return Err(CheckpointError::UnexpectedTensor { name });
        }
    } else {
        report.unexpected = unexpected;
    }

    model.assign(&accepted)?;

    if !report.is_complete() {
        warn!(
            loaded = report.loaded.len(),
            skipped = ?report.skipped,
            missing = ?report.missing,
            "Checkpoint partially applied"
        );
    }
    Ok(report)
}

/// Tries each path in order and returns the first that loads under `mode`.
///
/// Failures are logged and collected. An embedding size mismatch stops the search
/// at once; it is reported as is rather than folded into [`CheckpointError::Exhausted`].
pub fn load_first(
    model: &PairingModel,
    paths: &[PathBuf],
    mode: LoadMode,
) -> Result<(PathBuf, LoadReport), CheckpointError> {
    let mut attempts = Vec::with_capacity(paths.len());
    for path in paths {
        match load_model(model, path, mode) {
            Ok(report) => {
                info!(path = %path.display(), mode = %mode, loaded = report.loaded.len(), "Checkpoint loaded");
                return Ok((path.clone(), report));
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(path = %path.display(), mode = %mode, error = %e, "Checkpoint candidate rejected");
                attempts.push(format!("{}: {}", path.display(), e));
            }
        }
    }
    Err(CheckpointError::Exhausted { attempts })
}

/// A checkpoint directory with its manifest.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Opens (and creates, if needed) a checkpoint directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CheckpointError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn epoch_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(epoch_filename(epoch))
    }

    pub fn best_path(&self) -> PathBuf {
        self.dir.join(BEST_MODEL_FILENAME)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILENAME)
    }

    pub fn manifest(&self) -> Result<Manifest, CheckpointError> {
        Manifest::read(&self.manifest_path())
    }

    /// Saves the per-epoch snapshot and appends it to the manifest.
    pub fn save_epoch(
        &self,
        tensors: &HashMap<String, Tensor>,
        epoch: usize,
        val_loss: f32,
        val_accuracy: f32,
    ) -> Result<PathBuf, CheckpointError> {
        let file = epoch_filename(epoch);
        let path = self.dir.join(&file);
        save_tensors(tensors, &path)?;

        let mut manifest = self.manifest()?;
        manifest.push(ManifestEntry {
            epoch,
            val_loss,
            val_accuracy,
            file,
            created_at: Utc::now(),
        });
        manifest.write(&self.manifest_path())?;
        Ok(path)
    }

    /// Replaces the canonical snapshot and records which epoch it came from.
    pub fn save_best(
        &self,
        tensors: &HashMap<String, Tensor>,
        epoch: usize,
    ) -> Result<PathBuf, CheckpointError> {
        let path = self.best_path();
        save_tensors(tensors, &path)?;

        let mut manifest = self.manifest()?;
        manifest.best_epoch = Some(epoch);
        manifest.write(&self.manifest_path())?;
        info!(epoch, path = %path.display(), "Canonical checkpoint updated");
        Ok(path)
    }
}
