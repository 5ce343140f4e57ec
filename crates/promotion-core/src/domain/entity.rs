//! Promotion inputs.

use model_registry::ArtifactRef;
use serde::{Deserialize, Serialize};

/// A freshly trained model awaiting promotion. Read-only for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainedEntity {
    /// Entity (station) identifier; also the registered model name.
    pub entity_id: String,
    /// Artifact produced by training.
    pub artifact_ref: ArtifactRef,
}

impl TrainedEntity {
    pub fn new(entity_id: impl Into<String>, artifact_ref: ArtifactRef) -> Self {
        Self {
            entity_id: entity_id.into(),
            artifact_ref,
        }
    }
}

/// The training batch every entity in one promotion cycle came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRun {
    pub parent_run_id: String,
}

impl BatchRun {
    pub fn new(parent_run_id: impl Into<String>) -> Self {
        Self {
            parent_run_id: parent_run_id.into(),
        }
    }
}
