//! sqlgate - a read-only, tenant-scoped, bounded SQL gate
//!
//! Untrusted SQL passes through two chained components:
//!
//! - [`validator::QueryValidator`] proves a statement read-only, scoped to
//!   one tenant and bounded, and rewrites it into an `ApprovedQuery`
//! - [`executor::BoundedReadExecutor`] runs an `ApprovedQuery` inside a
//!   read-only transaction with a statement timeout and all-paths cleanup
//!
//! [`gate::SqlGate`] wires the two together.

pub mod cli;
pub mod config;
pub mod executor;
pub mod gate;
pub mod observability;
pub mod validator;

pub use config::{ConfigError, GateConfig};
pub use gate::{GateError, GateResult, SqlGate};
