//! Unified gate error

use thiserror::Error;

use crate::executor::{ExecutorError, ExecutorErrorCode};
use crate::validator::ValidatorError;

/// Result type for gate operations
pub type GateResult<T> = Result<T, GateError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The statement was not accepted; nothing reached the engine
    #[error("query rejected: {0}")]
    Rejected(#[from] ValidatorError),

    #[error("query execution failed: {0}")]
    Execution(#[from] ExecutorError),
}

impl GateError {
    /// Stable machine-checkable code
    pub fn code(&self) -> &'static str {
        match self {
            GateError::Rejected(err) => err.code().code(),
            GateError::Execution(err) => err.code().code(),
        }
    }

    /// Whether the validator refused the statement before any engine call
    pub fn is_rejection(&self) -> bool {
        matches!(self, GateError::Rejected(_))
    }

    /// HTTP status an outer layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::Rejected(_) => 400,
            GateError::Execution(err) if err.is_timeout() => 504,
            GateError::Execution(err)
                if err.root().code() == ExecutorErrorCode::ConnectionAcquisitionFailed =>
            {
                503
            }
            GateError::Execution(_) => 500,
        }
    }
}
