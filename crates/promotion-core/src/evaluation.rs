//! Champion vs. challenger evaluation.
//!
//! [`EvaluationPolicy`] owns the one unconditional rule (no champion means
//! promote) and delegates everything else to an injected [`Comparator`].
//! Comparators must be pure functions of the two versions' recorded metrics,
//! so the same registry state always yields the same [`Decision`].

use std::sync::Arc;

use model_registry::ModelVersion;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::EvaluationError;

/// Outcome of comparing a challenger with the current champion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Promote,
    Reject,
}

/// Strategy deciding whether a challenger replaces an existing champion.
pub trait Comparator: Send + Sync {
    fn compare(
        &self,
        champion: &ModelVersion,
        challenger: &ModelVersion,
    ) -> Result<Decision, EvaluationError>;
}

/// Which way a metric improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricDirection {
    /// Error-style metrics (`val_mae`, `val_loss`).
    Lower,
    /// Goodness-of-fit metrics (`val_r2`).
    Higher,
}

/// The metric a [`MetricComparator`] ranks versions by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricRule {
    pub name: String,
    pub direction: MetricDirection,
    /// Margin the challenger must beat the champion by. Ties keep the champion.
    pub min_improvement: f64,
}

impl Default for MetricRule {
    fn default() -> Self {
        Self {
            name: "val_mae".to_string(),
            direction: MetricDirection::Lower,
            min_improvement: 0.0,
        }
    }
}

/// Compares one named metric; the challenger must improve by strictly more
/// than `min_improvement`.
#[derive(Debug, Clone, Default)]
pub struct MetricComparator {
    rule: MetricRule,
}

impl MetricComparator {
    pub fn new(rule: MetricRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &MetricRule {
        &self.rule
    }

    fn read(&self, version: &ModelVersion) -> Result<f64, EvaluationError> {
        let value = version.metrics.get(&self.rule.name).ok_or_else(|| {
            EvaluationError::MissingMetric {
                entity_name: version.entity_name.clone(),
                version: version.version,
                metric: self.rule.name.clone(),
            }
        })?;
        if !value.is_finite() {
            return Err(EvaluationError::NonFiniteMetric {
                entity_name: version.entity_name.clone(),
                version: version.version,
                metric: self.rule.name.clone(),
                value,
            });
        }
        Ok(value)
    }
}

impl Comparator for MetricComparator {
    fn compare(
        &self,
        champion: &ModelVersion,
        challenger: &ModelVersion,
    ) -> Result<Decision, EvaluationError> {
        let incumbent = self.read(champion)?;
        let candidate = self.read(challenger)?;

        let improvement = match self.rule.direction {
            MetricDirection::Lower => incumbent - candidate,
            MetricDirection::Higher => candidate - incumbent,
        };

        debug!(
            metric = %self.rule.name,
            champion = incumbent,
            challenger = candidate,
            improvement,
            "compared versions"
        );

        if improvement > self.rule.min_improvement {
            Ok(Decision::Promote)
        } else {
            Ok(Decision::Reject)
        }
    }
}

/// Promotion decision policy.
#[derive(Clone)]
pub struct EvaluationPolicy {
    comparator: Arc<dyn Comparator>,
}

impl EvaluationPolicy {
    pub fn new(comparator: Arc<dyn Comparator>) -> Self {
        Self { comparator }
    }

    /// Policy backed by a [`MetricComparator`] for `rule`.
    pub fn from_rule(rule: MetricRule) -> Self {
        Self::new(Arc::new(MetricComparator::new(rule)))
    }

    /// No champion always promotes; otherwise the comparator decides.
    pub fn decide(
        &self,
        entity_name: &str,
        champion: Option<&ModelVersion>,
        challenger: &ModelVersion,
    ) -> Result<Decision, EvaluationError> {
        match champion {
            None => {
                debug!(entity_name, "no champion, promoting challenger");
                Ok(Decision::Promote)
            }
            Some(champion) => self.comparator.compare(champion, challenger),
        }
    }
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self::from_rule(MetricRule::default())
    }
}
