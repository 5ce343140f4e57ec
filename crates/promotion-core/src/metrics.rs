//! Global atomic counters for promotion outcomes.
//!
//! Counters are incremented by the coordinator. Call [`Metrics::flush`] to
//! emit current values as a single `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::FinalState;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    promoted: AtomicU64,
    rejected: AtomicU64,
    skipped: AtomicU64,
    cleanup_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            promoted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            cleanup_failures: AtomicU64::new(0),
        }
    }

    /// Count one entity outcome.
    pub fn record_outcome(&self, state: &FinalState) {
        let (counter, name) = match state {
            FinalState::Promoted => (&self.promoted, "promoted"),
            FinalState::Rejected => (&self.rejected, "rejected"),
            FinalState::Skipped(_) => (&self.skipped, "skipped"),
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = name, "counter incremented");
    }

    pub fn inc_cleanup_failures(&self) {
        self.cleanup_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "cleanup_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            promoted = self.promoted(),
            rejected = self.rejected(),
            skipped = self.skipped(),
            cleanup_failures = self.cleanup_failures(),
        );
    }

    pub fn promoted(&self) -> u64 {
        self.promoted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn cleanup_failures(&self) -> u64 {
        self.cleanup_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.promoted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.cleanup_failures.store(0, Ordering::Relaxed);
    }
}
