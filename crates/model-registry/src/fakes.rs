//! In-memory fake for the registry trait (testing only)
//!
//! `MemoryRegistry` satisfies the `RegistryClient` contract without any
//! external dependencies. It also records every call in a journal and can be
//! told to fail (or silently drop) specific operations, so promotion tests can
//! assert exactly which registry mutations happened for an entity.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::RegistryError;
use crate::registry_traits::*;

/// Registry operation, as seen by the journal and fault plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SearchRuns,
    RegisterVersion,
    GetAlias,
    SetAlias,
    DeleteAlias,
    RecordRun,
    ListVersions,
}

impl Operation {
    /// Whether the operation changes model-registry state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::RegisterVersion | Operation::SetAlias | Operation::DeleteAlias
        )
    }
}

/// One journaled call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCall {
    pub op: Operation,
    pub entity_name: String,
    pub alias: Option<Alias>,
    pub version: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultKind {
    /// Return `RegistryError::Unavailable`.
    Fail,
    /// Report success without applying the write.
    Drop,
}

#[derive(Debug, Clone)]
struct Fault {
    op: Operation,
    entity_name: String,
    alias: Option<Alias>,
    kind: FaultKind,
}

impl Fault {
    fn applies(&self, op: Operation, entity_name: &str, alias: Option<Alias>) -> bool {
        self.op == op
            && self.entity_name == entity_name
            && (self.alias.is_none() || self.alias == alias)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    runs: Vec<RunRecord>,
    /// Versions per entity name, oldest first.
    versions: HashMap<String, Vec<ModelVersion>>,
    /// High-water mark per entity name; survives nothing being deleted.
    last_version: HashMap<String, u64>,
    aliases: HashMap<(String, Alias), u64>,
    journal: Vec<RegistryCall>,
    faults: Vec<Fault>,
}

impl RegistryState {
    fn log(&mut self, op: Operation, entity_name: &str, alias: Option<Alias>, version: Option<u64>) {
        self.journal.push(RegistryCall {
            op,
            entity_name: entity_name.to_string(),
            alias,
            version,
        });
    }

    fn fault(&self, op: Operation, entity_name: &str, alias: Option<Alias>) -> Option<FaultKind> {
        self.faults
            .iter()
            .find(|f| f.applies(op, entity_name, alias))
            .map(|f| f.kind)
    }

    fn find_version(&self, entity_name: &str, version: u64) -> Option<&ModelVersion> {
        self.versions
            .get(entity_name)
            .and_then(|vs| vs.iter().find(|v| v.version == version))
    }
}

fn injected(op: Operation, entity_name: &str) -> RegistryError {
    RegistryError::Unavailable(format!("injected fault: {op:?} for {entity_name}"))
}

/// In-memory registry backed by `HashMap`s behind a single `Mutex`.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    state: Mutex<RegistryState>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `op` for `entity_name` fail with `RegistryError::Unavailable`.
    pub fn fail_on(&self, op: Operation, entity_name: &str) {
        self.push_fault(op, entity_name, None, FaultKind::Fail);
    }

    /// Like [`fail_on`](Self::fail_on) but only for one alias.
    pub fn fail_alias(&self, op: Operation, entity_name: &str, alias: Alias) {
        self.push_fault(op, entity_name, Some(alias), FaultKind::Fail);
    }

    /// Acknowledge `set_alias` for `(entity_name, alias)` without storing it.
    pub fn drop_alias_writes(&self, entity_name: &str, alias: Alias) {
        self.push_fault(Operation::SetAlias, entity_name, Some(alias), FaultKind::Drop);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.state.lock().unwrap().faults.clear();
    }

    fn push_fault(&self, op: Operation, entity_name: &str, alias: Option<Alias>, kind: FaultKind) {
        self.state.lock().unwrap().faults.push(Fault {
            op,
            entity_name: entity_name.to_string(),
            alias,
            kind,
        });
    }

    /// Insert a fully-formed run record (lets tests control `created_at`).
    pub fn insert_run(&self, run: RunRecord) {
        self.state.lock().unwrap().runs.push(run);
    }

    /// Every call made so far, in order.
    pub fn journal(&self) -> Vec<RegistryCall> {
        self.state.lock().unwrap().journal.clone()
    }

    /// Mutating calls attempted for `entity_name`, in order.
    pub fn mutations_for(&self, entity_name: &str) -> Vec<RegistryCall> {
        self.state
            .lock()
            .unwrap()
            .journal
            .iter()
            .filter(|c| c.op.is_mutation() && c.entity_name == entity_name)
            .cloned()
            .collect()
    }

    /// Raw alias pointer, bypassing the journal.
    pub fn alias_target(&self, entity_name: &str, alias: Alias) -> Option<u64> {
        self.state
            .lock()
            .unwrap()
            .aliases
            .get(&(entity_name.to_string(), alias))
            .copied()
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    async fn search_runs(&self, filter: &RunFilter) -> RegistryResult<Vec<RunRecord>> {
        let mut state = self.state.lock().unwrap();
        state.log(Operation::SearchRuns, &filter.entity_id, None, None);
        if state.fault(Operation::SearchRuns, &filter.entity_id, None).is_some() {
            return Err(injected(Operation::SearchRuns, &filter.entity_id));
        }
        Ok(state
            .runs
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn register_version(
        &self,
        entity_name: &str,
        artifact_ref: &ArtifactRef,
        source_run: &RunId,
    ) -> RegistryResult<ModelVersion> {
        let mut state = self.state.lock().unwrap();
        state.log(Operation::RegisterVersion, entity_name, None, None);
        if state
            .fault(Operation::RegisterVersion, entity_name, None)
            .is_some()
        {
            return Err(injected(Operation::RegisterVersion, entity_name));
        }
        if !artifact_ref.is_valid() {
            return Err(RegistryError::InvalidArtifact {
                reference: artifact_ref.as_str().to_string(),
            });
        }
        let metrics = state
            .runs
            .iter()
            .find(|r| &r.run_id == source_run)
            .map(|r| r.metrics.clone())
            .ok_or_else(|| RegistryError::RunNotFound {
                run_id: source_run.to_string(),
            })?;

        let next = state.last_version.get(entity_name).copied().unwrap_or(0) + 1;
        state.last_version.insert(entity_name.to_string(), next);

        let version = ModelVersion {
            entity_name: entity_name.to_string(),
            version: next,
            artifact_ref: artifact_ref.clone(),
            source_run_id: source_run.clone(),
            metrics,
            created_at: Utc::now(),
        };
        state
            .versions
            .entry(entity_name.to_string())
            .or_default()
            .push(version.clone());
        Ok(version)
    }

    async fn get_version_by_alias(
        &self,
        entity_name: &str,
        alias: Alias,
    ) -> RegistryResult<Option<ModelVersion>> {
        let mut state = self.state.lock().unwrap();
        state.log(Operation::GetAlias, entity_name, Some(alias), None);
        if state
            .fault(Operation::GetAlias, entity_name, Some(alias))
            .is_some()
        {
            return Err(injected(Operation::GetAlias, entity_name));
        }
        let target = state.aliases.get(&(entity_name.to_string(), alias)).copied();
        Ok(target.and_then(|v| state.find_version(entity_name, v).cloned()))
    }

    async fn set_alias(
        &self,
        entity_name: &str,
        alias: Alias,
        version: u64,
    ) -> RegistryResult<()> {
        let mut state = self.state.lock().unwrap();
        state.log(Operation::SetAlias, entity_name, Some(alias), Some(version));
        match state.fault(Operation::SetAlias, entity_name, Some(alias)) {
            Some(FaultKind::Fail) => return Err(injected(Operation::SetAlias, entity_name)),
            Some(FaultKind::Drop) => return Ok(()),
            None => {}
        }
        if state.find_version(entity_name, version).is_none() {
            return Err(RegistryError::VersionNotFound {
                entity_name: entity_name.to_string(),
                version,
            });
        }
        state
            .aliases
            .insert((entity_name.to_string(), alias), version);
        Ok(())
    }

    async fn delete_alias(&self, entity_name: &str, alias: Alias) -> RegistryResult<()> {
        let mut state = self.state.lock().unwrap();
        state.log(Operation::DeleteAlias, entity_name, Some(alias), None);
        if state
            .fault(Operation::DeleteAlias, entity_name, Some(alias))
            .is_some()
        {
            return Err(injected(Operation::DeleteAlias, entity_name));
        }
        state.aliases.remove(&(entity_name.to_string(), alias));
        Ok(())
    }

    async fn record_run(&self, run: NewRun) -> RegistryResult<RunRecord> {
        let mut state = self.state.lock().unwrap();
        state.log(Operation::RecordRun, &run.entity_id, None, None);
        if state.fault(Operation::RecordRun, &run.entity_id, None).is_some() {
            return Err(injected(Operation::RecordRun, &run.entity_id));
        }
        let record = RunRecord {
            run_id: RunId::new(),
            parent_run_id: run.parent_run_id,
            entity_id: run.entity_id,
            metrics: run.metrics,
            created_at: Utc::now(),
        };
        state.runs.push(record.clone());
        Ok(record)
    }

    async fn list_versions(&self, entity_name: &str) -> RegistryResult<Vec<ModelVersion>> {
        let mut state = self.state.lock().unwrap();
        state.log(Operation::ListVersions, entity_name, None, None);
        if state
            .fault(Operation::ListVersions, entity_name, None)
            .is_some()
        {
            return Err(injected(Operation::ListVersions, entity_name));
        }
        let mut versions = state.versions.get(entity_name).cloned().unwrap_or_default();
        versions.reverse(); // newest first
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_alias_write_reports_success_but_stores_nothing() {
        let registry = MemoryRegistry::new();
        let run = registry
            .record_run(NewRun {
                parent_run_id: "parent".to_string(),
                entity_id: "station1".to_string(),
                metrics: MetricSet::new(),
            })
            .await
            .unwrap();
        let v = registry
            .register_version("station1", &ArtifactRef::for_run(&run.run_id, "model"), &run.run_id)
            .await
            .unwrap();

        registry.drop_alias_writes("station1", Alias::Champion);
        registry
            .set_alias("station1", Alias::Champion, v.version)
            .await
            .unwrap();

        assert_eq!(registry.alias_target("station1", Alias::Champion), None);
    }

    #[tokio::test]
    async fn journal_separates_reads_from_mutations() {
        let registry = MemoryRegistry::new();
        registry
            .search_runs(&RunFilter::new("parent", "station1"))
            .await
            .unwrap();
        registry
            .delete_alias("station1", Alias::Challenger)
            .await
            .unwrap();

        assert_eq!(registry.journal().len(), 2);
        let mutations = registry.mutations_for("station1");
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].op, Operation::DeleteAlias);
    }
}
