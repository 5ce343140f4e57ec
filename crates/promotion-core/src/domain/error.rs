//! Domain-level error taxonomy for model promotion.

use model_registry::RegistryError;

/// Coordinator stage an error was raised in. Rendered into skip reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Challenger,
    ChampionLookup,
    Promotion,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Challenger => "challenger",
            Stage::ChampionLookup => "champion lookup",
            Stage::Promotion => "promotion",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the evaluation policy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("metric {metric} missing for {entity_name} v{version}")]
    MissingMetric {
        entity_name: String,
        version: u64,
        metric: String,
    },

    #[error("metric {metric} is not finite for {entity_name} v{version}: {value}")]
    NonFiniteMetric {
        entity_name: String,
        version: u64,
        metric: String,
        value: f64,
    },
}

/// Errors raised by the alias manager.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AliasError {
    #[error("{0}")]
    Registry(#[from] RegistryError),

    #[error("{alias} for {entity_name} reads back {observed:?} after writing v{expected}")]
    Unconfirmed {
        entity_name: String,
        alias: String,
        expected: u64,
        observed: Option<u64>,
    },

    #[error("{alias} for {entity_name} still points at v{observed} after delete")]
    StillPresent {
        entity_name: String,
        alias: String,
        observed: u64,
    },
}

/// Promotion domain errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PromotionError {
    #[error("run not found for {entity_id} in parent run {parent_run_id}")]
    RunNotFound {
        parent_run_id: String,
        entity_id: String,
    },

    #[error("registration failed for {entity_name}: {reason}")]
    Registration { entity_name: String, reason: String },

    #[error("{stage} error: {source}")]
    Alias {
        stage: Stage,
        #[source]
        source: AliasError,
    },

    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("{stage} error: registry call timed out after {after_ms}ms")]
    Timeout { stage: Stage, after_ms: u64 },

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    #[error("invalid config: {0}")]
    Config(String),
}

/// Result type for promotion operations.
pub type Result<T> = std::result::Result<T, PromotionError>;
