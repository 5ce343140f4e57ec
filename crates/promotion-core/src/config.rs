//! Promotion configuration.
//!
//! Values come from an optional TOML file, then `LWF_*` environment
//! overrides. The result is passed explicitly to the coordinator; nothing
//! reads the environment after loading.
//!
//! ```toml
//! environment = "prod"
//! stack = "aws"
//! tracking_uri = "ws://registry.internal:8000"
//! max_concurrency = 4
//!
//! [metric]
//! name = "val_mae"
//! direction = "lower"
//! min_improvement = 0.01
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::{PromotionError, Result};
use crate::evaluation::MetricRule;

/// Environment variables read by [`PromotionConfig::apply_env`].
pub const ENV_ENVIRONMENT: &str = "LWF_ENV";
pub const ENV_STACK: &str = "LWF_STACK";
pub const ENV_TRACKING_URI: &str = "LWF_TRACKING_URI";
pub const ENV_MAX_CONCURRENCY: &str = "LWF_MAX_CONCURRENCY";
pub const ENV_PROMOTION_METRIC: &str = "LWF_PROMOTION_METRIC";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    /// Deployment environment (`dev`, `prod`).
    pub environment: String,
    /// Infrastructure stack name.
    pub stack: String,
    /// Registry address handed to the SurrealDB client (`mem://`,
    /// `surrealkv://path`, `ws://host:port`).
    pub tracking_uri: String,
    /// Database holding this experiment's runs and versions.
    pub experiment_name: String,
    /// Entities promoted concurrently; 1 is strictly sequential.
    pub max_concurrency: usize,
    /// Upper bound on any single registry call.
    pub registry_timeout_secs: u64,
    pub metric: MetricRule,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            stack: "local".to_string(),
            tracking_uri: "mem://".to_string(),
            experiment_name: "weather_prediction".to_string(),
            max_concurrency: 1,
            registry_timeout_secs: 30,
            metric: MetricRule::default(),
        }
    }
}

impl PromotionConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| PromotionError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| PromotionError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// File (if any), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `LWF_*` overrides from an arbitrary lookup.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup(ENV_ENVIRONMENT) {
            self.environment = v;
        }
        if let Some(v) = lookup(ENV_STACK) {
            self.stack = v;
        }
        if let Some(v) = lookup(ENV_TRACKING_URI) {
            self.tracking_uri = v;
        }
        if let Some(v) = lookup(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = v.parse().map_err(|_| {
                PromotionError::Config(format!("{ENV_MAX_CONCURRENCY} is not a number: {v}"))
            })?;
        }
        if let Some(v) = lookup(ENV_PROMOTION_METRIC) {
            self.metric.name = v;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(PromotionError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.registry_timeout_secs == 0 {
            return Err(PromotionError::Config(
                "registry_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.tracking_uri.trim().is_empty() {
            return Err(PromotionError::Config("tracking_uri is empty".to_string()));
        }
        if self.experiment_name.trim().is_empty() {
            return Err(PromotionError::Config("experiment_name is empty".to_string()));
        }
        if self.metric.name.trim().is_empty() {
            return Err(PromotionError::Config("metric.name is empty".to_string()));
        }
        if !self.metric.min_improvement.is_finite() || self.metric.min_improvement < 0.0 {
            return Err(PromotionError::Config(format!(
                "metric.min_improvement must be a finite non-negative number, got {}",
                self.metric.min_improvement
            )));
        }
        Ok(())
    }

    /// Registry namespace isolating one stack/environment pair.
    pub fn registry_namespace(&self) -> String {
        format!("{}_{}", self.stack, self.environment)
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::MetricDirection;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid_and_sequential() {
        let config = PromotionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.metric.name, "val_mae");
        assert_eq!(config.registry_namespace(), "local_dev");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PromotionConfig::from_toml_str(
            r#"
            environment = "prod"

            [metric]
            name = "val_r2"
            direction = "higher"
            "#,
        )
        .unwrap();
        assert_eq!(config.environment, "prod");
        assert_eq!(config.stack, "local");
        assert_eq!(config.metric.direction, MetricDirection::Higher);
        assert_eq!(config.metric.min_improvement, 0.0);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            (ENV_ENVIRONMENT, "prod"),
            (ENV_STACK, "aws"),
            (ENV_MAX_CONCURRENCY, "8"),
            (ENV_TRACKING_URI, "ws://registry:8000"),
        ]
        .into_iter()
        .collect();

        let config = PromotionConfig::default()
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.registry_namespace(), "aws_prod");
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.tracking_uri, "ws://registry:8000");
    }

    #[test]
    fn validate_rejects_blank_registry_address() {
        let config = PromotionConfig {
            tracking_uri: " ".to_string(),
            ..PromotionConfig::default()
        };
        assert!(matches!(config.validate(), Err(PromotionError::Config(_))));
    }

    #[test]
    fn bad_concurrency_override_is_a_config_error() {
        let err = PromotionConfig::default()
            .apply_overrides(|k| (k == ENV_MAX_CONCURRENCY).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, PromotionError::Config(_)));
    }

    #[test]
    fn validate_rejects_zero_concurrency_and_negative_margin() {
        let mut config = PromotionConfig {
            max_concurrency: 0,
            ..PromotionConfig::default()
        };
        assert!(config.validate().is_err());

        config.max_concurrency = 2;
        config.metric.min_improvement = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promotion.toml");
        std::fs::write(&path, "stack = \"gcp\"\nregistry_timeout_secs = 5\n").unwrap();

        let config = PromotionConfig::from_file(&path).unwrap();
        assert_eq!(config.stack, "gcp");
        assert_eq!(config.registry_timeout(), Duration::from_secs(5));
    }
}
