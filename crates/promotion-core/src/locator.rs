//! Run lookup: which training execution produced an entity's artifact.

use std::sync::Arc;

use model_registry::{RegistryClient, RunFilter, RunRecord};
use tracing::{debug, instrument};

use crate::domain::error::{PromotionError, Result};

/// Read-only lookup of training runs nested under a parent run.
#[derive(Clone)]
pub struct RunLocator {
    client: Arc<dyn RegistryClient>,
}

impl RunLocator {
    pub fn new(client: Arc<dyn RegistryClient>) -> Self {
        Self { client }
    }

    /// Locate the run for `(parent_run_id, entity_id)`.
    ///
    /// Several matches resolve to the newest `created_at`, ties broken by the
    /// smallest `run_id`. Zero matches, or a failed search, is `RunNotFound`.
    #[instrument(skip(self))]
    pub async fn locate(&self, parent_run_id: &str, entity_id: &str) -> Result<RunRecord> {
        let not_found = || PromotionError::RunNotFound {
            parent_run_id: parent_run_id.to_string(),
            entity_id: entity_id.to_string(),
        };

        let filter = RunFilter::new(parent_run_id, entity_id);
        let runs = self.client.search_runs(&filter).await.map_err(|e| {
            debug!(error = %e, "run search failed");
            not_found()
        })?;

        if runs.len() > 1 {
            debug!(matches = runs.len(), "ambiguous run match, taking newest");
        }
        pick_newest(runs).ok_or_else(not_found)
    }
}

fn pick_newest(runs: Vec<RunRecord>) -> Option<RunRecord> {
    runs.into_iter().min_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.run_id.cmp(&b.run_id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use model_registry::fakes::{MemoryRegistry, Operation};
    use model_registry::{MetricSet, RunId};

    fn run(id: &str, age_minutes: i64) -> RunRecord {
        RunRecord {
            run_id: RunId::from(id),
            parent_run_id: "parent".to_string(),
            entity_id: "station1".to_string(),
            metrics: MetricSet::new(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn newest_wins_then_smallest_id() {
        let now = Utc::now();
        let mut a = run("b-run", 0);
        let mut b = run("a-run", 0);
        a.created_at = now;
        b.created_at = now;
        let older = run("0-run", 10);

        let picked = pick_newest(vec![older, a, b]).unwrap();
        assert_eq!(picked.run_id.as_str(), "a-run");
    }

    #[tokio::test]
    async fn search_failure_reads_as_not_found() {
        let registry = Arc::new(MemoryRegistry::new());
        registry.fail_on(Operation::SearchRuns, "station1");
        let locator = RunLocator::new(registry);

        let err = locator.locate("parent", "station1").await.unwrap_err();
        assert!(matches!(err, PromotionError::RunNotFound { .. }));
    }

    #[tokio::test]
    async fn ambiguous_match_is_deterministic() {
        let registry = Arc::new(MemoryRegistry::new());
        registry.insert_run(run("old", 30));
        registry.insert_run(run("new", 1));
        let locator = RunLocator::new(registry);

        for _ in 0..3 {
            let found = locator.locate("parent", "station1").await.unwrap();
            assert_eq!(found.run_id.as_str(), "new");
        }
    }
}
