//! Per-entity outcomes and the batch report.

use serde::{Deserialize, Serialize};

/// Skip reason when no training run matches the entity.
pub const REASON_RUN_NOT_FOUND: &str = "run not found";
/// Skip reason when the registry refused the new version.
pub const REASON_REGISTRATION_FAILED: &str = "registration failed";
/// Skip reason for entities not started before cancellation.
pub const REASON_CANCELLED: &str = "cancelled";

/// Final state of one entity after a promotion cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum FinalState {
    /// Challenger became champion.
    Promoted,
    /// Champion kept; challenger stays registered but unaliased.
    Rejected,
    /// Cycle aborted for this entity.
    Skipped(String),
}

impl FinalState {
    pub fn skipped(reason: impl Into<String>) -> Self {
        FinalState::Skipped(reason.into())
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FinalState::Skipped(_))
    }

    /// Skip reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            FinalState::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Outcome for one input entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub entity_id: String,
    pub final_state: FinalState,
    /// Version registered during this cycle, when registration succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl PromotionOutcome {
    pub fn new(entity_id: impl Into<String>, final_state: FinalState, version: Option<u64>) -> Self {
        Self {
            entity_id: entity_id.into(),
            final_state,
            version,
        }
    }
}

/// One outcome per input entity, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionReport {
    pub parent_run_id: String,
    pub outcomes: Vec<PromotionOutcome>,
}

impl PromotionReport {
    pub fn promoted(&self) -> usize {
        self.count(|s| matches!(s, FinalState::Promoted))
    }

    pub fn rejected(&self) -> usize {
        self.count(|s| matches!(s, FinalState::Rejected))
    }

    pub fn skipped(&self) -> usize {
        self.count(FinalState::is_skipped)
    }

    /// First outcome recorded for `entity_id`.
    pub fn outcome(&self, entity_id: &str) -> Option<&PromotionOutcome> {
        self.outcomes.iter().find(|o| o.entity_id == entity_id)
    }

    /// Final states in input order.
    pub fn states(&self) -> Vec<FinalState> {
        self.outcomes.iter().map(|o| o.final_state.clone()).collect()
    }

    fn count(&self, pred: impl Fn(&FinalState) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.final_state)).count()
    }
}
