//! LWF promotion core
//!
//! Decides, per trained station model, whether a freshly registered version
//! replaces the current `champion` in the model registry.

pub mod alias;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod evaluation;
pub mod locator;
pub mod metrics;
pub mod obs;
pub mod registrar;
pub mod telemetry;

pub use alias::AliasManager;
pub use config::PromotionConfig;
pub use coordinator::PromotionCoordinator;
pub use domain::{
    AliasError, BatchRun, EvaluationError, FinalState, PromotionError, PromotionOutcome,
    PromotionReport, Result, Stage, TrainedEntity, REASON_CANCELLED, REASON_REGISTRATION_FAILED,
    REASON_RUN_NOT_FOUND,
};
pub use evaluation::{
    Comparator, Decision, EvaluationPolicy, MetricComparator, MetricDirection, MetricRule,
};
pub use locator::RunLocator;
pub use registrar::VersionRegistrar;

pub use metrics::METRICS;
pub use obs::{
    batch_span, emit_cleanup_failed, emit_entity_outcome, emit_promotion_finished,
    emit_promotion_started,
};
pub use telemetry::{init_tracing, service_span};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
