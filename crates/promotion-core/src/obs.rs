//! Structured observability hooks for the promotion lifecycle.
//!
//! This module provides:
//! - A batch-scoped tracing span to instrument a promotion cycle with
//! - Emission functions for key lifecycle events: batch start, per-entity
//!   outcome, challenger cleanup failure, batch finish
//!
//! Events are emitted at `info!` level (skips and cleanup failures at `warn!`).

use tracing::{info, warn};

use crate::domain::FinalState;

/// Span tagging everything inside one promotion cycle with its parent run.
///
/// # Example
///
/// ```ignore
/// use tracing::Instrument;
/// coordinator.promote(&batch, &run).instrument(batch_span("parent-run-123")).await;
/// ```
pub fn batch_span(parent_run_id: &str) -> tracing::Span {
    tracing::info_span!("lwf.promotion", parent_run_id = %parent_run_id)
}

/// Emit event: promotion cycle started.
pub fn emit_promotion_started(parent_run_id: &str, entities: usize, max_concurrency: usize) {
    info!(
        event = "promotion.started",
        parent_run_id = %parent_run_id,
        entities = entities,
        max_concurrency = max_concurrency,
    );
}

/// Emit event: one entity reached its final state.
pub fn emit_entity_outcome(entity_id: &str, state: &FinalState, version: Option<u64>) {
    match state {
        FinalState::Promoted => {
            info!(event = "promotion.entity_outcome", entity_id = %entity_id, state = "promoted", version = ?version)
        }
        FinalState::Rejected => {
            info!(event = "promotion.entity_outcome", entity_id = %entity_id, state = "rejected", version = ?version)
        }
        FinalState::Skipped(reason) => warn!(
            event = "promotion.entity_outcome",
            entity_id = %entity_id,
            state = "skipped",
            reason = %reason,
            version = ?version,
        ),
    }
}

/// Emit event: the transient challenger alias could not be removed.
pub fn emit_cleanup_failed(entity_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "promotion.cleanup_failed", entity_id = %entity_id, error = %error);
}

/// Emit event: promotion cycle finished.
pub fn emit_promotion_finished(
    parent_run_id: &str,
    promoted: usize,
    rejected: usize,
    skipped: usize,
    duration_ms: u64,
) {
    info!(
        event = "promotion.finished",
        parent_run_id = %parent_run_id,
        promoted = promoted,
        rejected = rejected,
        skipped = skipped,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_span_carries_name() {
        let span = batch_span("test-parent-run");
        if let Some(meta) = span.metadata() {
            assert_eq!(meta.name(), "lwf.promotion");
        }
    }
}
