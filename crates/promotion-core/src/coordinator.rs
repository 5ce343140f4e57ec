//! Champion/challenger promotion of one training batch.
//!
//! [`PromotionCoordinator`] walks every [`TrainedEntity`] through
//! locate → register → challenger → champion lookup → decide → promote →
//! cleanup, and folds each entity's fate into a [`PromotionOutcome`].
//! Registry failures never escape an entity; the batch call only fails for
//! malformed input.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::stream::{self, StreamExt};
use model_registry::{Alias, ModelVersion, RegistryClient};
use tokio::sync::watch;
use tracing::{debug, instrument, warn, Instrument};

use crate::alias::AliasManager;
use crate::config::PromotionConfig;
use crate::domain::error::{AliasError, PromotionError, Result, Stage};
use crate::domain::{
    BatchRun, FinalState, PromotionOutcome, PromotionReport, TrainedEntity, REASON_CANCELLED,
    REASON_REGISTRATION_FAILED, REASON_RUN_NOT_FOUND,
};
use crate::evaluation::{Decision, EvaluationPolicy};
use crate::locator::RunLocator;
use crate::metrics::METRICS;
use crate::obs;
use crate::registrar::VersionRegistrar;

/// One async lock per entity name, created on first use.
///
/// Entries are never removed; the map holds one small mutex per entity name
/// the coordinator has seen, which is bounded by the station fleet.
#[derive(Default)]
struct EntityLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl EntityLocks {
    fn get(&self, entity_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(entity_name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// A failure inside the alias phase, and whether `challenger` may have been
/// set when it happened.
struct StageFailure {
    error: PromotionError,
    challenger_set: bool,
}

/// Runs promotion cycles against one registry.
///
/// The coordinator borrows the registry through a shared handle; connection
/// setup and teardown belong to whoever built the client. One coordinator
/// may serve concurrent batches: alias mutations for the same entity name
/// are serialised by a per-name lock.
pub struct PromotionCoordinator {
    locator: RunLocator,
    registrar: VersionRegistrar,
    aliases: AliasManager,
    policy: EvaluationPolicy,
    config: PromotionConfig,
    locks: EntityLocks,
}

impl PromotionCoordinator {
    /// Coordinator using a [`MetricComparator`](crate::evaluation::MetricComparator)
    /// built from `config.metric`.
    pub fn new(client: Arc<dyn RegistryClient>, config: PromotionConfig) -> Self {
        let policy = EvaluationPolicy::from_rule(config.metric.clone());
        Self {
            locator: RunLocator::new(client.clone()),
            registrar: VersionRegistrar::new(client.clone()),
            aliases: AliasManager::new(client),
            policy,
            config,
            locks: EntityLocks::default(),
        }
    }

    /// Replace the evaluation policy.
    pub fn with_policy(mut self, policy: EvaluationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &PromotionConfig {
        &self.config
    }

    /// Promote every entity of `batch`. The report holds exactly one outcome
    /// per input entity, in input order.
    pub async fn promote(
        &self,
        batch: &[TrainedEntity],
        batch_run: &BatchRun,
    ) -> Result<PromotionReport> {
        // Sender kept alive so the flag simply stays false.
        let (_never, cancel) = watch::channel(false);
        self.promote_with_cancel(batch, batch_run, cancel).await
    }

    /// Like [`promote`](Self::promote), but entities not yet started when
    /// `cancel` turns `true` are reported `Skipped("cancelled")`. An entity
    /// already in flight runs to completion.
    pub async fn promote_with_cancel(
        &self,
        batch: &[TrainedEntity],
        batch_run: &BatchRun,
        cancel: watch::Receiver<bool>,
    ) -> Result<PromotionReport> {
        validate_batch(batch, batch_run)?;

        let span = obs::batch_span(&batch_run.parent_run_id);
        async {
            let started = Instant::now();
            let max_concurrency = self.config.max_concurrency.max(1);
            obs::emit_promotion_started(&batch_run.parent_run_id, batch.len(), max_concurrency);

            let outcomes: Vec<PromotionOutcome> = stream::iter(batch)
                .map(|entity| self.promote_entity(entity, batch_run, &cancel))
                .buffered(max_concurrency)
                .collect()
                .await;

            let report = PromotionReport {
                parent_run_id: batch_run.parent_run_id.clone(),
                outcomes,
            };
            obs::emit_promotion_finished(
                &report.parent_run_id,
                report.promoted(),
                report.rejected(),
                report.skipped(),
                started.elapsed().as_millis() as u64,
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    #[instrument(skip_all, fields(entity_id = %entity.entity_id))]
    async fn promote_entity(
        &self,
        entity: &TrainedEntity,
        batch_run: &BatchRun,
        cancel: &watch::Receiver<bool>,
    ) -> PromotionOutcome {
        let cancelled =
            || PromotionOutcome::new(&entity.entity_id, FinalState::skipped(REASON_CANCELLED), None);
        let outcome = if *cancel.borrow() {
            cancelled()
        } else {
            let lock = self.locks.get(&entity.entity_id);
            let _guard = lock.lock().await;
            // Cancel may have fired while a duplicate held the lock.
            if *cancel.borrow() {
                cancelled()
            } else {
                self.run_cycle(entity, batch_run).await
            }
        };

        obs::emit_entity_outcome(&outcome.entity_id, &outcome.final_state, outcome.version);
        METRICS.record_outcome(&outcome.final_state);
        outcome
    }

    async fn run_cycle(&self, entity: &TrainedEntity, batch_run: &BatchRun) -> PromotionOutcome {
        let name = entity.entity_id.as_str();
        let skipped = |reason: &str, version: Option<u64>| {
            PromotionOutcome::new(name, FinalState::skipped(reason), version)
        };

        let limit = self.config.registry_timeout();

        let run = match tokio::time::timeout(
            limit,
            self.locator.locate(&batch_run.parent_run_id, name),
        )
        .await
        {
            Ok(Ok(run)) => run,
            Ok(Err(e)) => {
                debug!(error = %e, "no run to promote");
                return skipped(REASON_RUN_NOT_FOUND, None);
            }
            Err(_) => {
                warn!(after_ms = limit.as_millis() as u64, "run search timed out");
                return skipped(REASON_RUN_NOT_FOUND, None);
            }
        };

        let version = match tokio::time::timeout(
            limit,
            self.registrar.register(name, &entity.artifact_ref, &run.run_id),
        )
        .await
        {
            Ok(Ok(version)) => version,
            Ok(Err(e)) => {
                warn!(error = %e, "registration failed");
                return skipped(REASON_REGISTRATION_FAILED, None);
            }
            Err(_) => {
                warn!(after_ms = limit.as_millis() as u64, "registration timed out");
                return skipped(REASON_REGISTRATION_FAILED, None);
            }
        };

        match self.challenge(name, &version).await {
            Ok(state) => PromotionOutcome::new(name, state, Some(version.version)),
            Err(failure) => {
                let mut reason = failure.error.to_string();
                if failure.challenger_set {
                    let cleanup = self.alias_call(
                        Stage::Cleanup,
                        self.aliases.delete_alias(name, Alias::Challenger),
                    );
                    if let Err(cleanup) = cleanup.await {
                        obs::emit_cleanup_failed(name, &cleanup);
                        METRICS.inc_cleanup_failures();
                        reason = format!("{reason}; challenger cleanup failed: {cleanup}");
                    }
                }
                skipped(&reason, Some(version.version))
            }
        }
    }

    /// Steps after registration: challenger, champion lookup, decision,
    /// promotion and challenger removal.
    async fn challenge(
        &self,
        name: &str,
        version: &ModelVersion,
    ) -> std::result::Result<FinalState, StageFailure> {
        // The write may have landed even when its read-back fails or times
        // out, so every failure from here on removes the challenger.
        let pending = |error: PromotionError| StageFailure {
            error,
            challenger_set: true,
        };

        self.alias_call(
            Stage::Challenger,
            self.aliases.set_alias(name, Alias::Challenger, version.version),
        )
        .await
        .map_err(pending)?;

        let champion = self
            .alias_call(
                Stage::ChampionLookup,
                self.aliases.get_alias(name, Alias::Champion),
            )
            .await
            .map_err(pending)?;

        let decision = self
            .policy
            .decide(name, champion.as_ref(), version)
            .map_err(|e| pending(e.into()))?;

        let state = match decision {
            Decision::Promote => {
                self.alias_call(
                    Stage::Promotion,
                    self.aliases.set_alias(name, Alias::Champion, version.version),
                )
                .await
                .map_err(pending)?;
                FinalState::Promoted
            }
            Decision::Reject => FinalState::Rejected,
        };

        // A failed removal is not retried.
        self.alias_call(
            Stage::Cleanup,
            self.aliases.delete_alias(name, Alias::Challenger),
        )
        .await
        .map_err(|error| StageFailure {
            error,
            challenger_set: false,
        })?;

        Ok(state)
    }

    /// Bound an alias operation by the registry timeout and tag its error
    /// with `stage`.
    async fn alias_call<T>(
        &self,
        stage: Stage,
        call: impl Future<Output = std::result::Result<T, AliasError>>,
    ) -> Result<T> {
        let limit = self.config.registry_timeout();
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(|source| PromotionError::Alias { stage, source }),
            Err(_) => Err(PromotionError::Timeout {
                stage,
                after_ms: limit.as_millis() as u64,
            }),
        }
    }
}

fn validate_batch(batch: &[TrainedEntity], batch_run: &BatchRun) -> Result<()> {
    if batch_run.parent_run_id.trim().is_empty() {
        return Err(PromotionError::InvalidBatch(
            "parent run id is empty".to_string(),
        ));
    }
    if let Some(index) = batch.iter().position(|e| e.entity_id.trim().is_empty()) {
        return Err(PromotionError::InvalidBatch(format!(
            "entity at position {index} has an empty id"
        )));
    }
    Ok(())
}
