//! Storage engine boundary
//!
//! The connection pool and the database driver live outside this crate.
//! They are reached only through these capability traits, whose methods
//! return boxed `Send` futures so the traits stay object-safe.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::validator::Param;

/// Boxed future returned by engine capabilities
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for engine calls
pub type EngineResult<T> = Result<T, EngineError>;

/// Scalar column value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Text(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        ScalarValue::Int(n)
    }
}

impl From<f64> for ScalarValue {
    fn from(n: f64) -> Self {
        ScalarValue::Float(n)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Bool(b)
    }
}

/// One result row: column name to value
pub type Row = BTreeMap<String, ScalarValue>;

/// Classification of an engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The engine aborted the statement on its statement timeout
    Timeout,
    /// Connection lost or unreachable
    Connectivity,
    /// Constraint or permission violation surfaced by the engine
    Constraint,
    /// Pool exhausted
    Saturated,
    Other,
}

impl EngineErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineErrorKind::Timeout => "timeout",
            EngineErrorKind::Connectivity => "connectivity",
            EngineErrorKind::Constraint => "constraint",
            EngineErrorKind::Saturated => "saturated",
            EngineErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure reported by the storage engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    /// Engine failure of `kind`; `message` is the engine's own wording
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Statement canceled by the engine's timeout
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Timeout, message)
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Connectivity, message)
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Constraint, message)
    }

    pub fn saturated(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Saturated, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Other, message)
    }
}

/// Source of connections, normally a pool.
///
/// `acquire` may wait or fail under saturation; admission policy belongs to
/// the implementor.
pub trait ConnectionSource: Send + Sync {
    fn acquire(&self) -> BoxFuture<'_, EngineResult<Box<dyn Connection>>>;
}

/// One acquired connection
pub trait Connection: Send {
    /// Start a transaction that refuses writes (e.g. `BEGIN READ ONLY`)
    fn begin_read_only(&mut self) -> BoxFuture<'_, EngineResult<()>>;

    /// Bound every statement in the current transaction
    /// (e.g. `SET LOCAL statement_timeout`)
    fn set_statement_timeout(&mut self, timeout: Duration) -> BoxFuture<'_, EngineResult<()>>;

    /// Run `sql`, binding `params` to `?` markers by position
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [Param],
    ) -> BoxFuture<'a, EngineResult<Vec<Row>>>;

    fn commit(&mut self) -> BoxFuture<'_, EngineResult<()>>;

    fn rollback(&mut self) -> BoxFuture<'_, EngineResult<()>>;

    /// Return the connection to its source
    fn release(self: Box<Self>) -> BoxFuture<'static, EngineResult<()>>;
}
