//! Alias writes that confirm themselves.

use std::sync::Arc;

use model_registry::{Alias, ModelVersion, RegistryClient};
use tracing::{debug, instrument};

use crate::domain::error::AliasError;

/// The only writer of `champion` / `challenger` pointers.
///
/// Every write is read back before success is reported, so a caller never
/// acts on an alias state the registry does not actually hold. All three
/// operations are idempotent for the same intent.
#[derive(Clone)]
pub struct AliasManager {
    client: Arc<dyn RegistryClient>,
}

impl AliasManager {
    pub fn new(client: Arc<dyn RegistryClient>) -> Self {
        Self { client }
    }

    /// Point `alias` at `version`, overwriting any previous target.
    #[instrument(skip(self), fields(alias = %alias))]
    pub async fn set_alias(
        &self,
        entity_name: &str,
        alias: Alias,
        version: u64,
    ) -> Result<(), AliasError> {
        self.client.set_alias(entity_name, alias, version).await?;

        let observed = self
            .client
            .get_version_by_alias(entity_name, alias)
            .await?
            .map(|v| v.version);
        if observed != Some(version) {
            return Err(AliasError::Unconfirmed {
                entity_name: entity_name.to_string(),
                alias: alias.to_string(),
                expected: version,
                observed,
            });
        }
        debug!(version, "alias set");
        Ok(())
    }

    /// Current target of `alias`, `None` when unset.
    pub async fn get_alias(
        &self,
        entity_name: &str,
        alias: Alias,
    ) -> Result<Option<ModelVersion>, AliasError> {
        Ok(self.client.get_version_by_alias(entity_name, alias).await?)
    }

    /// Remove `alias`; succeeds when it was never set.
    #[instrument(skip(self), fields(alias = %alias))]
    pub async fn delete_alias(&self, entity_name: &str, alias: Alias) -> Result<(), AliasError> {
        self.client.delete_alias(entity_name, alias).await?;

        if let Some(v) = self.client.get_version_by_alias(entity_name, alias).await? {
            return Err(AliasError::StillPresent {
                entity_name: entity_name.to_string(),
                alias: alias.to_string(),
                observed: v.version,
            });
        }
        debug!("alias deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_registry::fakes::MemoryRegistry;
    use model_registry::{ArtifactRef, MetricSet, NewRun};

    async fn with_versions(n: usize) -> Arc<MemoryRegistry> {
        let registry = Arc::new(MemoryRegistry::new());
        let run = registry
            .record_run(NewRun {
                parent_run_id: "parent".to_string(),
                entity_id: "station1".to_string(),
                metrics: MetricSet::new(),
            })
            .await
            .unwrap();
        for _ in 0..n {
            registry
                .register_version("station1", &ArtifactRef::for_run(&run.run_id, "model"), &run.run_id)
                .await
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn set_is_idempotent_and_overwrites() {
        let registry = with_versions(2).await;
        let aliases = AliasManager::new(registry.clone());

        aliases.set_alias("station1", Alias::Champion, 1).await.unwrap();
        aliases.set_alias("station1", Alias::Champion, 1).await.unwrap();
        aliases.set_alias("station1", Alias::Champion, 2).await.unwrap();

        let champion = aliases
            .get_alias("station1", Alias::Champion)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(champion.version, 2);
    }

    #[tokio::test]
    async fn unobserved_write_is_an_error() {
        let registry = with_versions(1).await;
        registry.drop_alias_writes("station1", Alias::Challenger);
        let aliases = AliasManager::new(registry);

        let err = aliases
            .set_alias("station1", Alias::Challenger, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AliasError::Unconfirmed {
                expected: 1,
                observed: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn delete_of_missing_alias_succeeds() {
        let registry = with_versions(0).await;
        let aliases = AliasManager::new(registry);

        aliases
            .delete_alias("station1", Alias::Challenger)
            .await
            .unwrap();
        aliases
            .delete_alias("station1", Alias::Challenger)
            .await
            .unwrap();
    }
}
