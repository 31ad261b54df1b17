use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CheckpointError;

/// One saved epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub epoch: usize,
    pub val_loss: f32,
    pub val_accuracy: f32,
    /// File name relative to the checkpoint directory.
    pub file: String,
    pub created_at: DateTime<Utc>,
}

/// Record of the checkpoints currently in a directory, one entry per epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
    /// Epoch whose parameters were copied to the canonical file.
    pub best_epoch: Option<usize>,
}

impl Manifest {
    /// Reads a manifest, returning an empty one if the file does not exist yet.
    pub fn read(path: &Path) -> Result<Self, CheckpointError> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(CheckpointError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), CheckpointError> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| CheckpointError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Appends `entry`, dropping any earlier entry for the same epoch.
    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.retain(|e| e.epoch != entry.epoch);
        self.entries.push(entry);
    }

    pub fn best(&self) -> Option<&ManifestEntry> {
        let epoch = self.best_epoch?;
        self.entries.iter().rev().find(|e| e.epoch == epoch)
    }

    pub fn latest(&self) -> Option<&ManifestEntry> {
        self.entries.last()
    }
}
