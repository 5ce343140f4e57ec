//! Domain models for model promotion.
//!
//! - `TrainedEntity` / `BatchRun`: inputs of one promotion cycle
//! - `PromotionOutcome` / `PromotionReport`: per-entity results
//! - `PromotionError`: error taxonomy

pub mod entity;
pub mod error;
pub mod outcome;

pub use entity::{BatchRun, TrainedEntity};
pub use error::{AliasError, EvaluationError, PromotionError, Result, Stage};
pub use outcome::{
    FinalState, PromotionOutcome, PromotionReport, REASON_CANCELLED, REASON_REGISTRATION_FAILED,
    REASON_RUN_NOT_FOUND,
};
