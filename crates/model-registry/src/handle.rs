//! SurrealDB Handle - Connection and Operations
//!
//! Manages the connection and provides the registry operations:
//! - run_record / run_search
//! - version_register / version_get / version_list
//! - alias_get / alias_set / alias_delete
//!
//! Supports both local (in-memory) and cloud (WebSocket) connections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::RegistryError;
use crate::registry_traits::{
    Alias, ArtifactRef, MetricSet, ModelVersion, NewRun, RegistryResult, RunFilter, RunId,
    RunRecord,
};

/// Default namespace when none is configured
pub const DEFAULT_NAMESPACE: &str = "lwf";
/// Default database name
pub const DEFAULT_DATABASE: &str = "registry";

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    /// Database username
    pub username: String,
    /// Database password
    pub password: String,
    /// Namespace (default: "lwf")
    pub namespace: String,
    /// Database name (default: "registry")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set whether this is a root user
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: `default_namespace`)
    /// - SURREALDB_DATABASE (optional, default: `default_database`)
    /// - SURREALDB_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env(
        default_namespace: &str,
        default_database: &str,
    ) -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| default_namespace.to_string());
        let database = std::env::var("SURREALDB_DATABASE")
            .unwrap_or_else(|_| default_database.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// SurrealDB connection handle for the model registry
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbRunRecord {
    run_id: String,
    parent_run_id: String,
    entity_id: String,
    metrics: MetricSet,
    created_at: SurrealDatetime,
}

impl DbRunRecord {
    fn into_run_record(self) -> RunRecord {
        RunRecord {
            run_id: RunId(self.run_id),
            parent_run_id: self.parent_run_id,
            entity_id: self.entity_id,
            metrics: self.metrics,
            created_at: DateTime::<Utc>::from(self.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbModelVersion {
    entity_name: String,
    version: u64,
    artifact_ref: String,
    source_run_id: String,
    metrics: MetricSet,
    created_at: SurrealDatetime,
}

impl DbModelVersion {
    fn into_model_version(self) -> ModelVersion {
        ModelVersion {
            entity_name: self.entity_name,
            version: self.version,
            artifact_ref: ArtifactRef::new(self.artifact_ref),
            source_run_id: RunId(self.source_run_id),
            metrics: self.metrics,
            created_at: DateTime::<Utc>::from(self.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbAlias {
    entity_name: String,
    alias: String,
    version: u64,
    updated_at: SurrealDatetime,
}

fn alias_key(entity_name: &str, alias: Alias) -> String {
    format!("{}:{}", entity_name, alias.as_str())
}

fn backend(e: surrealdb::Error) -> RegistryError {
    RegistryError::Backend(e.to_string())
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> RegistryResult<Self> {
        Self::setup_url("mem://", DEFAULT_NAMESPACE, DEFAULT_DATABASE).await
    }

    /// Connect to any SurrealDB URL (`mem://`, `surrealkv://path`, `ws://host`)
    #[instrument(skip(url), fields(namespace = %namespace, database = %database))]
    pub async fn setup_url(url: &str, namespace: &str, database: &str) -> RegistryResult<Self> {
        info!("Connecting to SurrealDB at {}", url);

        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| RegistryError::Connection(format!("{url}: {e}")))?;

        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| RegistryError::Connection(e.to_string()))?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(handle)
    }

    /// Connect to SurrealDB Cloud
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_cloud(config: CloudConfig) -> RegistryResult<Self> {
        info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                RegistryError::Connection(format!(
                    "Failed to connect to {}: {}",
                    config.endpoint, e
                ))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                RegistryError::Connection(format!("Root authentication failed: {}", e))
            })?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                RegistryError::Connection(format!("Database authentication failed: {}", e))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                RegistryError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB Cloud connected and schema initialized");
        Ok(handle)
    }

    /// Connect using environment variables, else `url`
    ///
    /// If SURREALDB_ENDPOINT (with credentials) is set, connects to cloud.
    /// Otherwise connects to `url`, which may be `mem://`.
    #[instrument(skip_all, fields(namespace = %namespace, database = %database))]
    pub async fn setup_from_env(namespace: &str, database: &str, url: &str) -> RegistryResult<Self> {
        if let Ok(config) = CloudConfig::from_env(namespace, database) {
            info!("Cloud config found, connecting to SurrealDB Cloud");
            return Self::setup_cloud(config).await;
        }

        Self::setup_url(url, namespace, database).await
    }

    /// Initialize the database schema
    async fn init_schema(&self) -> RegistryResult<()> {
        debug!("Initializing registry schema");

        let schema = r#"
            -- Training runs (tracking server)
            DEFINE TABLE runs SCHEMAFULL;
            DEFINE FIELD run_id ON runs TYPE string;
            DEFINE FIELD parent_run_id ON runs TYPE string;
            DEFINE FIELD entity_id ON runs TYPE string;
            DEFINE FIELD metrics ON runs FLEXIBLE TYPE object;
            DEFINE FIELD created_at ON runs TYPE datetime;
            DEFINE INDEX idx_run_id ON runs FIELDS run_id UNIQUE;
            DEFINE INDEX idx_run_parent_entity ON runs FIELDS parent_run_id, entity_id;

            -- Registered model versions
            DEFINE TABLE model_versions SCHEMAFULL;
            DEFINE FIELD entity_name ON model_versions TYPE string;
            DEFINE FIELD version ON model_versions TYPE int;
            DEFINE FIELD artifact_ref ON model_versions TYPE string;
            DEFINE FIELD source_run_id ON model_versions TYPE string;
            DEFINE FIELD metrics ON model_versions FLEXIBLE TYPE object;
            DEFINE FIELD created_at ON model_versions TYPE datetime;
            DEFINE INDEX idx_version_name_number ON model_versions FIELDS entity_name, version UNIQUE;

            -- Alias pointers, one record per (entity_name, alias)
            DEFINE TABLE aliases SCHEMAFULL;
            DEFINE FIELD entity_name ON aliases TYPE string;
            DEFINE FIELD alias ON aliases TYPE string;
            DEFINE FIELD version ON aliases TYPE int;
            DEFINE FIELD updated_at ON aliases TYPE datetime;
            DEFINE INDEX idx_alias_name ON aliases FIELDS entity_name, alias UNIQUE;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| RegistryError::SchemaSetup(e.to_string()))?;

        debug!("Schema initialized successfully");
        Ok(())
    }

    // ========== Run Operations ==========

    /// Log a new training run
    #[instrument(skip(self, run), fields(parent_run_id = %run.parent_run_id, entity_id = %run.entity_id))]
    pub async fn run_record(&self, run: NewRun) -> RegistryResult<RunRecord> {
        let record = DbRunRecord {
            run_id: RunId::new().0,
            parent_run_id: run.parent_run_id,
            entity_id: run.entity_id,
            metrics: run.metrics,
            created_at: SurrealDatetime::from(Utc::now()),
        };

        let created: Option<DbRunRecord> = self
            .db
            .create("runs")
            .content(record)
            .await
            .map_err(backend)?;

        created
            .map(DbRunRecord::into_run_record)
            .ok_or_else(|| RegistryError::Backend("failed to create run record".to_string()))
    }

    /// Find runs nested under a parent run for one entity
    #[instrument(skip(self), fields(parent_run_id = %filter.parent_run_id, entity_id = %filter.entity_id))]
    pub async fn run_search(&self, filter: &RunFilter) -> RegistryResult<Vec<RunRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM runs WHERE parent_run_id = $parent AND entity_id = $entity")
            .bind(("parent", filter.parent_run_id.clone()))
            .bind(("entity", filter.entity_id.clone()))
            .await
            .map_err(backend)?;

        let runs: Vec<DbRunRecord> = result.take(0).map_err(backend)?;
        Ok(runs.into_iter().map(DbRunRecord::into_run_record).collect())
    }

    async fn run_get(&self, run_id: &RunId) -> RegistryResult<Option<RunRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM runs WHERE run_id = $run_id LIMIT 1")
            .bind(("run_id", run_id.0.clone()))
            .await
            .map_err(backend)?;

        let runs: Vec<DbRunRecord> = result.take(0).map_err(backend)?;
        Ok(runs.into_iter().next().map(DbRunRecord::into_run_record))
    }

    // ========== Version Operations ==========

    /// Register the next version number for `entity_name`.
    ///
    /// The unique `(entity_name, version)` index rejects a concurrent writer
    /// that computed the same number, so numbers are never reused.
    #[instrument(skip(self, artifact_ref), fields(entity_name = %entity_name, source_run = %source_run))]
    pub async fn version_register(
        &self,
        entity_name: &str,
        artifact_ref: &ArtifactRef,
        source_run: &RunId,
    ) -> RegistryResult<ModelVersion> {
        if !artifact_ref.is_valid() {
            return Err(RegistryError::InvalidArtifact {
                reference: artifact_ref.as_str().to_string(),
            });
        }
        let run = self
            .run_get(source_run)
            .await?
            .ok_or_else(|| RegistryError::RunNotFound {
                run_id: source_run.to_string(),
            })?;

        let latest = self
            .version_list(entity_name)
            .await?
            .first()
            .map(|v| v.version)
            .unwrap_or(0);

        let record = DbModelVersion {
            entity_name: entity_name.to_string(),
            version: latest + 1,
            artifact_ref: artifact_ref.as_str().to_string(),
            source_run_id: run.run_id.0,
            metrics: run.metrics,
            created_at: SurrealDatetime::from(Utc::now()),
        };

        let created: Option<DbModelVersion> = self
            .db
            .create("model_versions")
            .content(record)
            .await
            .map_err(backend)?;

        let version = created
            .map(DbModelVersion::into_model_version)
            .ok_or_else(|| {
                RegistryError::Backend("failed to create model version".to_string())
            })?;
        debug!(version = version.version, "Model version registered");
        Ok(version)
    }

    /// Get one version by number
    #[instrument(skip(self), fields(entity_name = %entity_name))]
    pub async fn version_get(
        &self,
        entity_name: &str,
        version: u64,
    ) -> RegistryResult<Option<ModelVersion>> {
        let mut result = self
            .db
            .query("SELECT * FROM model_versions WHERE entity_name = $name AND version = $version LIMIT 1")
            .bind(("name", entity_name.to_string()))
            .bind(("version", version))
            .await
            .map_err(backend)?;

        let versions: Vec<DbModelVersion> = result.take(0).map_err(backend)?;
        Ok(versions
            .into_iter()
            .next()
            .map(DbModelVersion::into_model_version))
    }

    /// All versions for a name (newest first)
    #[instrument(skip(self), fields(entity_name = %entity_name))]
    pub async fn version_list(&self, entity_name: &str) -> RegistryResult<Vec<ModelVersion>> {
        let mut result = self
            .db
            .query("SELECT * FROM model_versions WHERE entity_name = $name ORDER BY version DESC")
            .bind(("name", entity_name.to_string()))
            .await
            .map_err(backend)?;

        let versions: Vec<DbModelVersion> = result.take(0).map_err(backend)?;
        Ok(versions
            .into_iter()
            .map(DbModelVersion::into_model_version)
            .collect())
    }

    // ========== Alias Operations ==========

    /// Resolve an alias to the version it points at
    #[instrument(skip(self), fields(entity_name = %entity_name, alias = %alias))]
    pub async fn alias_get(
        &self,
        entity_name: &str,
        alias: Alias,
    ) -> RegistryResult<Option<ModelVersion>> {
        let mut result = self
            .db
            .query("SELECT * FROM aliases WHERE entity_name = $name AND alias = $alias LIMIT 1")
            .bind(("name", entity_name.to_string()))
            .bind(("alias", alias.as_str().to_string()))
            .await
            .map_err(backend)?;

        let aliases: Vec<DbAlias> = result.take(0).map_err(backend)?;
        match aliases.into_iter().next() {
            Some(pointer) => self.version_get(entity_name, pointer.version).await,
            None => Ok(None),
        }
    }

    /// Point an alias at an existing version, replacing any prior pointer
    #[instrument(skip(self), fields(entity_name = %entity_name, alias = %alias))]
    pub async fn alias_set(
        &self,
        entity_name: &str,
        alias: Alias,
        version: u64,
    ) -> RegistryResult<()> {
        if self.version_get(entity_name, version).await?.is_none() {
            return Err(RegistryError::VersionNotFound {
                entity_name: entity_name.to_string(),
                version,
            });
        }

        let record = DbAlias {
            entity_name: entity_name.to_string(),
            alias: alias.as_str().to_string(),
            version,
            updated_at: SurrealDatetime::from(Utc::now()),
        };

        let mut result = self
            .db
            .query("UPSERT type::thing('aliases', $key) CONTENT $record")
            .bind(("key", alias_key(entity_name, alias)))
            .bind(("record", record))
            .await
            .map_err(backend)?;

        let _written: Vec<DbAlias> = result.take(0).map_err(backend)?;
        Ok(())
    }

    /// Remove an alias; deleting a missing alias succeeds
    #[instrument(skip(self), fields(entity_name = %entity_name, alias = %alias))]
    pub async fn alias_delete(&self, entity_name: &str, alias: Alias) -> RegistryResult<()> {
        let mut result = self
            .db
            .query("DELETE type::thing('aliases', $key)")
            .bind(("key", alias_key(entity_name, alias)))
            .await
            .map_err(backend)?;

        let _deleted: Vec<DbAlias> = result.take(0).map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_surreal_connection_and_schema_creation() {
        let handle = SurrealHandle::setup_db().await;
        assert!(handle.is_ok(), "Failed to setup DB: {:?}", handle.err());
    }

    #[tokio::test]
    async fn test_run_search_filters_by_parent_and_entity() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        for (parent, entity) in [("p1", "station1"), ("p1", "station2"), ("p2", "station1")] {
            handle
                .run_record(NewRun {
                    parent_run_id: parent.to_string(),
                    entity_id: entity.to_string(),
                    metrics: MetricSet::new().with("val_mae", 1.0),
                })
                .await
                .unwrap();
        }

        let runs = handle
            .run_search(&RunFilter::new("p1", "station1"))
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].entity_id, "station1");
        assert_eq!(runs[0].metrics.get("val_mae"), Some(1.0));
    }

    #[tokio::test]
    async fn test_alias_set_requires_existing_version() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        let err = handle
            .alias_set("station1", Alias::Champion, 7)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::VersionNotFound { version: 7, .. }));
    }

    #[tokio::test]
    async fn test_setup_url_rejects_unknown_scheme() {
        let err = SurrealHandle::setup_url("nope://registry", DEFAULT_NAMESPACE, DEFAULT_DATABASE)
            .await
            .err()
            .expect("unknown scheme must not connect");
        match err {
            RegistryError::Connection(msg) => assert!(msg.starts_with("nope://registry")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_alias_delete_missing_is_noop() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        handle
            .alias_delete("station1", Alias::Challenger)
            .await
            .unwrap();
    }
}
