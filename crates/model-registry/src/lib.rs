//! Model Registry: versioned model storage for LWF promotion
//!
//! This crate is the persistence boundary of the promotion engine. It owns
//! every network/storage call; it holds no promotion logic.
//!
//! ## Key Components
//!
//! - `RegistryClient`: async trait over runs, versions and aliases
//! - `MemoryRegistry`: in-memory fake with fault injection (`fakes`)
//! - `SurrealHandle`: SurrealDB connection and queries
//! - `SurrealModelRegistry`: `RegistryClient` over a `SurrealHandle`

mod error;
pub mod fakes;
mod handle;
pub mod registry_traits;
mod surreal_registry;

pub use error::RegistryError;
pub use handle::{CloudConfig, SurrealHandle, DEFAULT_DATABASE, DEFAULT_NAMESPACE};
pub use registry_traits::{
    Alias, ArtifactRef, MetricSet, ModelVersion, NewRun, RegistryClient, RegistryResult,
    RunFilter, RunId, RunRecord,
};
pub use surreal_registry::SurrealModelRegistry;
