//! Executor error types
//!
//! Error codes:
//! - SQLGATE_CONNECTION_ACQUISITION_FAILED
//! - SQLGATE_TRANSACTION_BEGIN_FAILED
//! - SQLGATE_STATEMENT_TIMEOUT_EXCEEDED
//! - SQLGATE_QUERY_EXECUTION_FAILED
//! - SQLGATE_TRANSACTION_COMMIT_FAILED
//! - SQLGATE_TRANSACTION_ROLLBACK_FAILED
//! - SQLGATE_CONNECTION_RELEASE_FAILED
//!
//! Every variant carries the engine failure that caused it. Cleanup
//! failures keep the error that triggered the cleanup.

use std::fmt;

use thiserror::Error;

use super::engine::{EngineError, EngineErrorKind};

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The call failed; the connection was cleaned up
    Error,
    /// Cleanup itself failed; the connection may be left in an unknown state
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    ConnectionAcquisitionFailed,
    TransactionBeginFailed,
    StatementTimeoutExceeded,
    QueryExecutionFailed,
    TransactionCommitFailed,
    TransactionRollbackFailed,
    ConnectionReleaseFailed,
}

impl ExecutorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::ConnectionAcquisitionFailed => {
                "SQLGATE_CONNECTION_ACQUISITION_FAILED"
            }
            ExecutorErrorCode::TransactionBeginFailed => "SQLGATE_TRANSACTION_BEGIN_FAILED",
            ExecutorErrorCode::StatementTimeoutExceeded => "SQLGATE_STATEMENT_TIMEOUT_EXCEEDED",
            ExecutorErrorCode::QueryExecutionFailed => "SQLGATE_QUERY_EXECUTION_FAILED",
            ExecutorErrorCode::TransactionCommitFailed => "SQLGATE_TRANSACTION_COMMIT_FAILED",
            ExecutorErrorCode::TransactionRollbackFailed => "SQLGATE_TRANSACTION_ROLLBACK_FAILED",
            ExecutorErrorCode::ConnectionReleaseFailed => "SQLGATE_CONNECTION_RELEASE_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::TransactionRollbackFailed
            | ExecutorErrorCode::ConnectionReleaseFailed => Severity::Critical,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("could not acquire a connection: {0}")]
    ConnectionAcquisitionFailed(EngineError),

    #[error("could not begin read-only transaction: {0}")]
    TransactionBeginFailed(EngineError),

    /// Either the engine aborted the statement (`engine` is set) or the
    /// client-side deadline expired first (`engine` is `None`)
    #[error("statement exceeded {timeout_ms}ms timeout")]
    StatementTimeoutExceeded {
        timeout_ms: u64,
        engine: Option<EngineError>,
    },

    #[error("query failed: {0}")]
    QueryExecutionFailed(EngineError),

    #[error("commit failed: {0}")]
    TransactionCommitFailed(EngineError),

    #[error("rollback failed ({rollback}) after: {original}")]
    TransactionRollbackFailed {
        rollback: EngineError,
        original: Box<ExecutorError>,
    },

    #[error("connection release failed: {release}")]
    ConnectionReleaseFailed {
        release: EngineError,
        /// Failure that preceded the release, if the call had already failed
        prior: Option<Box<ExecutorError>>,
    },
}

impl ExecutorError {
    /// Code of the outermost failure; see [`ExecutorError::root`] for the
    /// one that started the unhappy path
    pub fn code(&self) -> ExecutorErrorCode {
        match self {
            ExecutorError::ConnectionAcquisitionFailed(_) => {
                ExecutorErrorCode::ConnectionAcquisitionFailed
            }
            ExecutorError::TransactionBeginFailed(_) => ExecutorErrorCode::TransactionBeginFailed,
            ExecutorError::StatementTimeoutExceeded { .. } => {
                ExecutorErrorCode::StatementTimeoutExceeded
            }
            ExecutorError::QueryExecutionFailed(_) => ExecutorErrorCode::QueryExecutionFailed,
            ExecutorError::TransactionCommitFailed(_) => ExecutorErrorCode::TransactionCommitFailed,
            ExecutorError::TransactionRollbackFailed { .. } => {
                ExecutorErrorCode::TransactionRollbackFailed
            }
            ExecutorError::ConnectionReleaseFailed { .. } => {
                ExecutorErrorCode::ConnectionReleaseFailed
            }
        }
    }

    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    /// The failure that started the unhappy path, looking through cleanup
    /// failures
    pub fn root(&self) -> &ExecutorError {
        match self {
            ExecutorError::TransactionRollbackFailed { original, .. } => original.root(),
            ExecutorError::ConnectionReleaseFailed {
                prior: Some(prior), ..
            } => prior.root(),
            other => other,
        }
    }

    /// True when the root failure was a statement timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), ExecutorError::StatementTimeoutExceeded { .. })
    }

    /// Map a failed query call
    pub(crate) fn from_query(err: EngineError, timeout_ms: u64) -> Self {
        if err.kind == EngineErrorKind::Timeout {
            ExecutorError::StatementTimeoutExceeded {
                timeout_ms,
                engine: Some(err),
            }
        } else {
            ExecutorError::QueryExecutionFailed(err)
        }
    }
}
