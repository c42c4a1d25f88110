//! SQL gate facade
//!
//! `RawQueryRequest → QueryValidator → ApprovedQuery → BoundedReadExecutor →
//! rows`. The two components are always chained; the executor trusts that
//! its input came from the validator.

mod errors;
mod gate;

pub use errors::{GateError, GateResult};
pub use gate::SqlGate;
