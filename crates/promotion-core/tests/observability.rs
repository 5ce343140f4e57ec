//! Observability tests for the promotion lifecycle.
//!
//! These tests verify that structured tracing events are emitted for batch
//! start, per-entity outcomes, cleanup failures and batch finish.

use std::sync::Arc;

use model_registry::fakes::{MemoryRegistry, Operation};
use model_registry::{Alias, ArtifactRef, MetricSet, NewRun, RegistryClient};
use promotion_core::{
    batch_span, emit_cleanup_failed, emit_entity_outcome, emit_promotion_finished,
    emit_promotion_started, BatchRun, FinalState, PromotionConfig, PromotionCoordinator,
    TrainedEntity, METRICS,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_promotion_started_logs_parent_and_size() {
    emit_promotion_started("parent-123", 12, 4);
    assert!(logs_contain("promotion.started"));
    assert!(logs_contain("parent-123"));
}

#[traced_test]
#[test]
fn test_emit_entity_outcome_logs_state() {
    emit_entity_outcome("station1", &FinalState::Promoted, Some(3));
    emit_entity_outcome("station2", &FinalState::skipped("run not found"), None);
    assert!(logs_contain("state=\"promoted\""));
    assert!(logs_contain("run not found"));
}

#[traced_test]
#[test]
fn test_emit_cleanup_failed_logs_warning() {
    let error_msg = "registry unavailable";
    emit_cleanup_failed("station9", &error_msg);
    assert!(logs_contain("promotion.cleanup_failed"));
    assert!(logs_contain("WARN"));
}

#[traced_test]
#[test]
fn test_emit_promotion_finished_logs_counts() {
    emit_promotion_finished("parent-456", 2, 1, 0, 1500);
    assert!(logs_contain("promotion.finished"));
    assert!(logs_contain("duration_ms=1500"));
}

#[traced_test]
#[test]
fn test_batch_span_enter() {
    let span = batch_span("test-span-parent");
    let _entered = span.enter();
    tracing::info!("inside batch");
    assert!(logs_contain("inside batch"));
}

/// A full cycle logs its lifecycle and counts the cleanup failure.
#[traced_test]
#[tokio::test]
async fn test_promotion_cycle_emits_lifecycle_events() {
    let registry = Arc::new(MemoryRegistry::new());
    let run = registry
        .record_run(NewRun {
            parent_run_id: "parent-obs".to_string(),
            entity_id: "station-obs".to_string(),
            metrics: MetricSet::new().with("val_mae", 0.4),
        })
        .await
        .expect("record run");
    registry.fail_alias(Operation::GetAlias, "station-obs", Alias::Champion);
    registry.fail_alias(Operation::DeleteAlias, "station-obs", Alias::Challenger);

    let before = METRICS.cleanup_failures();
    let batch = vec![TrainedEntity::new(
        "station-obs",
        ArtifactRef::for_run(&run.run_id, "model"),
    )];
    let report = PromotionCoordinator::new(registry, PromotionConfig::default())
        .promote(&batch, &BatchRun::new("parent-obs"))
        .await
        .expect("promote");

    assert_eq!(report.skipped(), 1);
    assert!(METRICS.cleanup_failures() > before);
    assert!(logs_contain("promotion.started"));
    assert!(logs_contain("promotion.cleanup_failed"));
    assert!(logs_contain("promotion.entity_outcome"));
    assert!(logs_contain("promotion.finished"));
}
