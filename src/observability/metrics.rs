//! Gate counters
//!
//! - Counters only, monotonic, reset on process start
//! - Lock-free; `Relaxed` ordering since no counter guards other memory

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct GateMetrics {
    /// Statements approved by the validator
    validated: AtomicU64,
    /// Statements rejected by the validator
    rejected: AtomicU64,
    /// Executions that committed and returned rows
    executed: AtomicU64,
    /// Executions that failed for any reason
    failed: AtomicU64,
    /// Failures that were statement timeouts
    timed_out: AtomicU64,
    /// Rollbacks attempted
    rollbacks: AtomicU64,
    rollback_failures: AtomicU64,
}

impl GateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_validated(&self) {
        self.validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rollback_failures(&self) {
        self.rollback_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter. Counters are read one by one,
    /// so a snapshot taken under load may be mid-update.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validated: self.validated.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            rollback_failures: self.rollback_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub validated: u64,
    pub rejected: u64,
    pub executed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rollbacks: u64,
    pub rollback_failures: u64,
}
