use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::info;

use crate::model::PairingModel;

/// An immutable parameter set as seen by serving.
#[derive(Debug)]
pub struct ModelSnapshot {
    model: PairingModel,
    version: u64,
    published_at: DateTime<Utc>,
}

impl ModelSnapshot {
    pub fn model(&self) -> &PairingModel {
        &self.model
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

/// Copy-on-write holder of the current [`ModelSnapshot`].
///
/// Readers clone the inner `Arc` and release the lock before scoring, so a publish
/// never waits on in-flight requests and requests never see a half-applied update.
#[derive(Debug)]
pub struct SnapshotHandle {
    current: RwLock<Arc<ModelSnapshot>>,
}

impl SnapshotHandle {
    /// Wraps `model` as version 1. The caller must not mutate `model` afterwards;
    /// pass a [`PairingModel::freeze`] copy if it is still being trained.
    pub fn new(model: PairingModel) -> Self {
        Self {
            current: RwLock::new(Arc::new(ModelSnapshot {
                model,
                version: 1,
                published_at: Utc::now(),
            })),
        }
    }

    /// The snapshot in effect right now.
    pub fn load(&self) -> Arc<ModelSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Swaps in a new parameter set and returns its version.
    pub fn publish(&self, model: PairingModel) -> u64 {
        let mut current = self.current.write();
        let version = current.version + 1;
        *current = Arc::new(ModelSnapshot {
            model,
            version,
            published_at: Utc::now(),
        });
        info!(version, "Model snapshot published");
        version
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }
}
