use std::sync::Arc;

use async_trait::async_trait;

use crate::registry_traits::{
    Alias, ArtifactRef, ModelVersion, NewRun, RegistryClient, RegistryResult, RunFilter, RunId,
    RunRecord,
};
use crate::SurrealHandle;

/// SurrealDB-backed implementation of the RegistryClient trait.
#[derive(Clone)]
pub struct SurrealModelRegistry {
    handle: Arc<SurrealHandle>,
}

impl SurrealModelRegistry {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl RegistryClient for SurrealModelRegistry {
    async fn search_runs(&self, filter: &RunFilter) -> RegistryResult<Vec<RunRecord>> {
        self.handle.run_search(filter).await
    }

    async fn register_version(
        &self,
        entity_name: &str,
        artifact_ref: &ArtifactRef,
        source_run: &RunId,
    ) -> RegistryResult<ModelVersion> {
        self.handle
            .version_register(entity_name, artifact_ref, source_run)
            .await
    }

    async fn get_version_by_alias(
        &self,
        entity_name: &str,
        alias: Alias,
    ) -> RegistryResult<Option<ModelVersion>> {
        self.handle.alias_get(entity_name, alias).await
    }

    async fn set_alias(
        &self,
        entity_name: &str,
        alias: Alias,
        version: u64,
    ) -> RegistryResult<()> {
        self.handle.alias_set(entity_name, alias, version).await
    }

    async fn delete_alias(&self, entity_name: &str, alias: Alias) -> RegistryResult<()> {
        self.handle.alias_delete(entity_name, alias).await
    }

    async fn record_run(&self, run: NewRun) -> RegistryResult<RunRecord> {
        self.handle.run_record(run).await
    }

    async fn list_versions(&self, entity_name: &str) -> RegistryResult<Vec<ModelVersion>> {
        self.handle.version_list(entity_name).await
    }
}
