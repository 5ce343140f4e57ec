//! Trait contract tests for RegistryClient.
//!
//! These tests verify the behavioral contract of the registry trait using the
//! in-memory fake. Any conforming implementation must pass these.

use chrono::{Duration, Utc};
use model_registry::fakes::{MemoryRegistry, Operation};
use model_registry::registry_traits::*;
use model_registry::RegistryError;

fn sample_run(parent: &str, entity: &str, val_mae: f64) -> NewRun {
    NewRun {
        parent_run_id: parent.to_string(),
        entity_id: entity.to_string(),
        metrics: MetricSet::new().with("val_mae", val_mae).with("val_r2", 0.8),
    }
}

async fn registered(registry: &MemoryRegistry, entity: &str) -> ModelVersion {
    let run = registry
        .record_run(sample_run("parent-1", entity, 1.0))
        .await
        .unwrap();
    registry
        .register_version(entity, &ArtifactRef::for_run(&run.run_id, "model"), &run.run_id)
        .await
        .unwrap()
}

// ===========================================================================
// Runs
// ===========================================================================

#[tokio::test]
async fn search_runs_matches_parent_and_entity_exactly() {
    let registry = MemoryRegistry::new();
    registry
        .record_run(sample_run("parent-1", "station1", 1.0))
        .await
        .unwrap();
    registry
        .record_run(sample_run("parent-1", "station2", 1.0))
        .await
        .unwrap();
    registry
        .record_run(sample_run("parent-2", "station1", 1.0))
        .await
        .unwrap();

    let runs = registry
        .search_runs(&RunFilter::new("parent-1", "station1"))
        .await
        .unwrap();

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].parent_run_id, "parent-1");
    assert_eq!(runs[0].entity_id, "station1");
}

#[tokio::test]
async fn search_runs_empty_when_nothing_matches() {
    let registry = MemoryRegistry::new();
    let runs = registry
        .search_runs(&RunFilter::new("parent-1", "station9"))
        .await
        .unwrap();
    assert!(runs.is_empty());
}

#[tokio::test]
async fn inserted_runs_keep_their_timestamps() {
    let registry = MemoryRegistry::new();
    let older = Utc::now() - Duration::hours(1);
    registry.insert_run(RunRecord {
        run_id: RunId::from("run-old"),
        parent_run_id: "parent-1".to_string(),
        entity_id: "station1".to_string(),
        metrics: MetricSet::new(),
        created_at: older,
    });

    let runs = registry
        .search_runs(&RunFilter::new("parent-1", "station1"))
        .await
        .unwrap();
    assert_eq!(runs[0].created_at, older);
}

// ===========================================================================
// Versions
// ===========================================================================

#[tokio::test]
async fn versions_strictly_increase_per_entity() {
    let registry = MemoryRegistry::new();
    let mut last = 0;
    for _ in 0..5 {
        let v = registered(&registry, "station1").await;
        assert!(v.version > last);
        last = v.version;
    }
    assert_eq!(last, 5);
}

#[tokio::test]
async fn versions_are_numbered_independently_per_entity() {
    let registry = MemoryRegistry::new();
    registered(&registry, "station1").await;
    registered(&registry, "station1").await;
    let other = registered(&registry, "station2").await;

    assert_eq!(other.version, 1);
}

#[tokio::test]
async fn register_snapshots_source_run_metrics() {
    let registry = MemoryRegistry::new();
    let run = registry
        .record_run(sample_run("parent-1", "station1", 0.42))
        .await
        .unwrap();
    let v = registry
        .register_version("station1", &ArtifactRef::for_run(&run.run_id, "model"), &run.run_id)
        .await
        .unwrap();

    assert_eq!(v.source_run_id, run.run_id);
    assert_eq!(v.metrics.get("val_mae"), Some(0.42));
}

#[tokio::test]
async fn register_rejects_blank_artifact() {
    let registry = MemoryRegistry::new();
    let run = registry
        .record_run(sample_run("parent-1", "station1", 1.0))
        .await
        .unwrap();
    let err = registry
        .register_version("station1", &ArtifactRef::new(""), &run.run_id)
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::InvalidArtifact { .. }));
}

#[tokio::test]
async fn register_rejects_unknown_source_run() {
    let registry = MemoryRegistry::new();
    let err = registry
        .register_version(
            "station1",
            &ArtifactRef::new("runs:/missing/model"),
            &RunId::from("missing"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::RunNotFound { .. }));
}

#[tokio::test]
async fn failed_registration_does_not_consume_a_version_number() {
    let registry = MemoryRegistry::new();
    registry.fail_on(Operation::RegisterVersion, "station1");
    let run = registry
        .record_run(sample_run("parent-1", "station1", 1.0))
        .await
        .unwrap();
    assert!(registry
        .register_version("station1", &ArtifactRef::for_run(&run.run_id, "model"), &run.run_id)
        .await
        .is_err());

    registry.clear_faults();
    let v = registered(&registry, "station1").await;
    assert_eq!(v.version, 1);
}

#[tokio::test]
async fn list_versions_newest_first() {
    let registry = MemoryRegistry::new();
    for _ in 0..3 {
        registered(&registry, "station1").await;
    }
    let versions: Vec<u64> = registry
        .list_versions("station1")
        .await
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect();

    assert_eq!(versions, vec![3, 2, 1]);
}

// ===========================================================================
// Aliases
// ===========================================================================

#[tokio::test]
async fn alias_absent_by_default() {
    let registry = MemoryRegistry::new();
    let champion = registry
        .get_version_by_alias("station1", Alias::Champion)
        .await
        .unwrap();
    assert!(champion.is_none());
}

#[tokio::test]
async fn set_alias_overwrites_prior_pointer() {
    let registry = MemoryRegistry::new();
    let v1 = registered(&registry, "station1").await;
    let v2 = registered(&registry, "station1").await;

    registry
        .set_alias("station1", Alias::Champion, v1.version)
        .await
        .unwrap();
    registry
        .set_alias("station1", Alias::Champion, v2.version)
        .await
        .unwrap();

    let champion = registry
        .get_version_by_alias("station1", Alias::Champion)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(champion.version, v2.version);
}

#[tokio::test]
async fn set_alias_rejects_unknown_version() {
    let registry = MemoryRegistry::new();
    let err = registry
        .set_alias("station1", Alias::Champion, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::VersionNotFound { version: 3, .. }));
}

#[tokio::test]
async fn champion_and_challenger_are_independent() {
    let registry = MemoryRegistry::new();
    let v1 = registered(&registry, "station1").await;
    let v2 = registered(&registry, "station1").await;

    registry
        .set_alias("station1", Alias::Champion, v1.version)
        .await
        .unwrap();
    registry
        .set_alias("station1", Alias::Challenger, v2.version)
        .await
        .unwrap();
    registry
        .delete_alias("station1", Alias::Challenger)
        .await
        .unwrap();

    assert_eq!(registry.alias_target("station1", Alias::Champion), Some(1));
    assert_eq!(registry.alias_target("station1", Alias::Challenger), None);
}

#[tokio::test]
async fn aliases_are_scoped_per_entity() {
    let registry = MemoryRegistry::new();
    let a = registered(&registry, "station1").await;
    registered(&registry, "station2").await;

    registry
        .set_alias("station1", Alias::Champion, a.version)
        .await
        .unwrap();

    assert!(registry
        .get_version_by_alias("station2", Alias::Champion)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn delete_alias_is_noop_when_absent() {
    let registry = MemoryRegistry::new();
    registry
        .delete_alias("station1", Alias::Challenger)
        .await
        .unwrap();
    registry
        .delete_alias("station1", Alias::Challenger)
        .await
        .unwrap();
}

#[tokio::test]
async fn alias_fault_is_scoped_to_one_alias() {
    let registry = MemoryRegistry::new();
    let v = registered(&registry, "station1").await;
    registry.fail_alias(Operation::SetAlias, "station1", Alias::Champion);

    assert!(registry
        .set_alias("station1", Alias::Champion, v.version)
        .await
        .is_err());
    registry
        .set_alias("station1", Alias::Challenger, v.version)
        .await
        .unwrap();
}
