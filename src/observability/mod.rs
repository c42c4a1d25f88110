//! Observability subsystem
//!
//! - Structured JSON logging to stderr
//! - Lifecycle scopes with elapsed time
//! - Lock-free counters
//!
//! # Principles
//!
//! 1. Observability never changes an outcome; logging failures are ignored
//! 2. SQL text and parameter values are never logged
//! 3. Deterministic output: sorted keys, one line per event

mod logger;
mod metrics;
mod scope;

pub use logger::{render, Logger, Severity};
pub use metrics::{GateMetrics, MetricsSnapshot};
pub use scope::ObservationScope;
