//! Tracing setup for the `lwf-promote` binary.
//!
//! [`init_tracing`] installs the global subscriber once; later calls are
//! ignored. [`service_span`] is the root span a command runs in, so every
//! event carries the stack, environment and experiment it touched.

use tracing::{Level, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::PromotionConfig;

/// Crates whose events follow the requested level.
const OWN_TARGETS: [&str; 3] = ["lwf_promote", "promotion_core", "model_registry"];

/// Filter used when `RUST_LOG` is unset: `level` for our crates, `warn` for
/// everything else (the SurrealDB client logs every query at `debug`).
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Initialise the global tracing subscriber.
///
/// * `json`: newline-delimited JSON with targets, for log shipping.
/// * `level`: verbosity of our own crates when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_target(true).json().flatten_event(true))
            .try_init()
            .ok();
    } else {
        registry.with(fmt::layer().with_target(false)).try_init().ok();
    }
}

/// Root span for one CLI invocation against `config`'s registry.
pub fn service_span(config: &PromotionConfig) -> Span {
    tracing::info_span!(
        "lwf_promote",
        environment = %config.environment,
        stack = %config.stack,
        experiment = %config.experiment_name,
    )
}
