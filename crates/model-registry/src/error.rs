//! Error types for model-registry

use thiserror::Error;

/// Errors that can occur while talking to a model registry backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Backend rejected or failed an operation
    #[error("Registry backend error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Artifact reference cannot be registered
    #[error("Invalid artifact reference: {reference:?}")]
    InvalidArtifact { reference: String },

    /// No version with this number exists for the entity
    #[error("Version {version} not found for model {entity_name}")]
    VersionNotFound { entity_name: String, version: u64 },

    /// The source run does not exist
    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    /// Registry temporarily unreachable
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

impl From<surrealdb::Error> for RegistryError {
    fn from(err: surrealdb::Error) -> Self {
        RegistryError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}
