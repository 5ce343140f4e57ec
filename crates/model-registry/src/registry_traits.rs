//! Registry trait definitions for LWF model promotion
//!
//! `RegistryClient` is the single seam between the promotion engine and a
//! versioned model registry. It covers three concerns:
//! - Runs: training executions nested under a parent batch run
//! - Versions: monotonically numbered model versions per entity name
//! - Aliases: named pointers (`champion`, `challenger`) to one version
//!
//! The trait is async and backend-agnostic. An in-memory fake lives in the
//! `fakes` module; `SurrealModelRegistry` is the persistent backend.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Result type for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

/// Unique identifier for a training run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random RunId
    pub fn new() -> Self {
        RunId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        RunId(s.to_string())
    }
}

/// Named quality metrics logged by a training run (e.g. `val_mae`, `val_r2`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<String, f64>);

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        MetricSet(iter.into_iter().collect())
    }
}

/// A training run as recorded by the tracking server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    /// Batch run this execution is nested under
    pub parent_run_id: String,
    /// Entity (station) the run trained a model for
    pub entity_id: String,
    pub metrics: MetricSet,
    pub created_at: DateTime<Utc>,
}

/// Input for logging a new run (produced by the training stage)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRun {
    pub parent_run_id: String,
    pub entity_id: String,
    pub metrics: MetricSet,
}

/// Exact-match filter used by `search_runs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFilter {
    pub parent_run_id: String,
    pub entity_id: String,
}

impl RunFilter {
    pub fn new(parent_run_id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            parent_run_id: parent_run_id.into(),
            entity_id: entity_id.into(),
        }
    }

    pub fn matches(&self, run: &RunRecord) -> bool {
        run.parent_run_id == self.parent_run_id && run.entity_id == self.entity_id
    }
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Opaque reference to a trained artifact (e.g. `runs:/<run_id>/model`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(uri: impl Into<String>) -> Self {
        ArtifactRef(uri.into())
    }

    /// Artifact path inside a tracked run, the tracking server's URI scheme.
    pub fn for_run(run_id: &RunId, path: &str) -> Self {
        ArtifactRef(format!("runs:/{}/{}", run_id, path.trim_start_matches('/')))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A reference is registrable when it is non-blank.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Registered model name (one per entity)
    pub entity_name: String,
    /// Registry-assigned, strictly increasing per `entity_name`
    pub version: u64,
    pub artifact_ref: ArtifactRef,
    /// Run that produced the artifact
    pub source_run_id: RunId,
    /// Snapshot of the source run's metrics at registration time
    pub metrics: MetricSet,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Aliases
// ---------------------------------------------------------------------------

/// Named pointer scoped to one entity name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alias {
    /// Currently deployed, production-serving version
    Champion,
    /// Transient candidate under evaluation
    Challenger,
}

impl Alias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alias::Champion => "champion",
            Alias::Challenger => "challenger",
        }
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alias {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "champion" => Ok(Alias::Champion),
            "challenger" => Ok(Alias::Challenger),
            other => Err(format!("unknown alias: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryClient
// ---------------------------------------------------------------------------

/// Versioned model registry.
///
/// Guarantees expected from every backend:
/// - `register_version` assigns a version strictly greater than every
///   version previously assigned for the same name; numbers are never reused.
/// - `set_alias` overwrites any prior pointer for `(name, alias)`.
/// - `delete_alias` is a no-op when the alias is absent.
/// - Aliases of different entity names are independent.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Find runs matching the filter exactly, in no particular order.
    async fn search_runs(&self, filter: &RunFilter) -> RegistryResult<Vec<RunRecord>>;

    /// Register a new version of `entity_name` from an artifact of `source_run`.
    async fn register_version(
        &self,
        entity_name: &str,
        artifact_ref: &ArtifactRef,
        source_run: &RunId,
    ) -> RegistryResult<ModelVersion>;

    /// Resolve an alias. `None` when the alias is not set.
    async fn get_version_by_alias(
        &self,
        entity_name: &str,
        alias: Alias,
    ) -> RegistryResult<Option<ModelVersion>>;

    /// Point `alias` at `version`. Fails if the version does not exist.
    async fn set_alias(&self, entity_name: &str, alias: Alias, version: u64)
        -> RegistryResult<()>;

    /// Remove `alias`. No-op if absent.
    async fn delete_alias(&self, entity_name: &str, alias: Alias) -> RegistryResult<()>;

    /// Log a finished training run (upstream training stage).
    async fn record_run(&self, run: NewRun) -> RegistryResult<RunRecord>;

    /// All versions registered for `entity_name`, newest first.
    async fn list_versions(&self, entity_name: &str) -> RegistryResult<Vec<ModelVersion>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_ref_for_run_uses_runs_scheme() {
        let run = RunId::from("abc123");
        let artifact = ArtifactRef::for_run(&run, "/model");
        assert_eq!(artifact.as_str(), "runs:/abc123/model");
        assert!(artifact.is_valid());
        assert!(!ArtifactRef::new("   ").is_valid());
    }

    #[test]
    fn alias_parses_and_displays() {
        assert_eq!("champion".parse::<Alias>().unwrap(), Alias::Champion);
        assert_eq!(Alias::Challenger.to_string(), "challenger");
        assert!("production".parse::<Alias>().is_err());
    }

    #[test]
    fn metric_set_serializes_as_plain_map() {
        let metrics = MetricSet::new().with("val_mae", 1.25).with("val_r2", 0.8);
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json, serde_json::json!({"val_mae": 1.25, "val_r2": 0.8}));
    }
}
