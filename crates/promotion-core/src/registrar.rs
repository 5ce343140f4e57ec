//! Version registration with a monotonicity check.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use model_registry::{ArtifactRef, ModelVersion, RegistryClient, RunId};
use tracing::{info, instrument};

use crate::domain::error::{PromotionError, Result};

/// Registers artifacts as new model versions.
///
/// Remembers the highest version it has seen per entity name and refuses a
/// backend answer that does not exceed it. Errors are final; retrying is the
/// caller's business.
pub struct VersionRegistrar {
    client: Arc<dyn RegistryClient>,
    high_water: Mutex<HashMap<String, u64>>,
}

impl VersionRegistrar {
    pub fn new(client: Arc<dyn RegistryClient>) -> Self {
        Self {
            client,
            high_water: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(self, artifact_ref), fields(artifact = %artifact_ref))]
    pub async fn register(
        &self,
        entity_name: &str,
        artifact_ref: &ArtifactRef,
        source_run: &RunId,
    ) -> Result<ModelVersion> {
        let failed = |reason: String| PromotionError::Registration {
            entity_name: entity_name.to_string(),
            reason,
        };

        if !artifact_ref.is_valid() {
            return Err(failed(format!("invalid artifact reference {artifact_ref:?}")));
        }

        let version = self
            .client
            .register_version(entity_name, artifact_ref, source_run)
            .await
            .map_err(|e| failed(e.to_string()))?;

        {
            let mut seen = self.high_water.lock().unwrap_or_else(|e| e.into_inner());
            let previous = seen.get(entity_name).copied().unwrap_or(0);
            if version.version <= previous {
                return Err(failed(format!(
                    "registry returned v{} after v{}",
                    version.version, previous
                )));
            }
            seen.insert(entity_name.to_string(), version.version);
        }

        info!(version = version.version, "Registered model version");
        Ok(version)
    }
}
