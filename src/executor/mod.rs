//! Bounded read executor subsystem
//!
//! Executes exactly one [`ApprovedQuery`](crate::validator::ApprovedQuery)
//! inside a read-only transaction with a statement timeout, and guarantees
//! cleanup on every path.
//!
//! # Guarantees
//!
//! - The transaction is committed only after a fully successful execute,
//!   otherwise rolled back
//! - The connection is released (or its release attempted) on every path
//!   after a successful acquire
//! - The failure that started the unhappy path is returned unchanged, wrapped
//!   only when cleanup itself fails
//! - No validation, no retries, no shared mutable state between calls

mod config;
mod engine;
mod errors;
mod executor;
mod scripted;
mod state;

pub use config::ExecutorConfig;
pub use engine::{
    BoxFuture, Connection, ConnectionSource, EngineError, EngineErrorKind, EngineResult, Row,
    ScalarValue,
};
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use executor::BoundedReadExecutor;
pub use scripted::{ExecutedStatement, ScriptedEngine, Step};
pub use state::{ExecutionState, ExecutionTrace};
