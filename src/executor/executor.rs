//! Bounded read executor
//!
//! Runs one approved statement with the fixed protocol:
//!
//! 1. Acquire a connection
//! 2. Begin a read-only transaction
//! 3. Set the statement timeout (first statement in the transaction)
//! 4. Execute with positional parameters, raced against a client deadline
//! 5. Commit and return the rows
//!
//! Any failure after begin rolls back. Release is attempted on every path
//! once a connection was acquired. No retries.

use std::sync::Arc;

use uuid::Uuid;

use super::config::ExecutorConfig;
use super::engine::{Connection, ConnectionSource, Row};
use super::errors::{ExecutorError, ExecutorResult};
use super::state::{ExecutionState, ExecutionTrace};
use crate::config::ConfigError;
use crate::observability::ObservationScope;
use crate::validator::ApprovedQuery;

/// Executes approved statements against a connection source.
///
/// Holds no per-call state; concurrent calls share only the source.
#[derive(Clone)]
pub struct BoundedReadExecutor {
    source: Arc<dyn ConnectionSource>,
    config: ExecutorConfig,
}

impl BoundedReadExecutor {
    /// Create an executor over `source`.
    ///
    /// Fails with `ConfigError::Invalid` when `config` would run statements
    /// without a timeout.
    pub fn new(
        source: Arc<dyn ConnectionSource>,
        config: ExecutorConfig,
    ) -> Result<Self, ConfigError> {
        config.check().map_err(ConfigError::Invalid)?;
        Ok(Self { source, config })
    }

    /// Timeouts this executor applies
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute one approved statement and return its rows in engine order
    pub async fn execute(&self, query: &ApprovedQuery) -> ExecutorResult<Vec<Row>> {
        self.execute_with_trace(query).await.0
    }

    /// Execute and also return the states the call went through
    pub async fn execute_with_trace(
        &self,
        query: &ApprovedQuery,
    ) -> (ExecutorResult<Vec<Row>>, ExecutionTrace) {
        let execution_id = Uuid::new_v4().to_string();
        let param_count = query.params().len().to_string();
        let scope = ObservationScope::new(
            "EXECUTION",
            &[
                ("execution_id", execution_id.as_str()),
                ("param_count", param_count.as_str()),
            ],
        );

        let mut trace = ExecutionTrace::new();
        let result = self.run(query, &mut trace).await;

        let states = trace.to_string();
        match &result {
            Ok(rows) => {
                let row_count = rows.len().to_string();
                scope.complete(&[("rows", row_count.as_str()), ("states", states.as_str())]);
            }
            Err(err) => {
                scope.fail(
                    err.code().code(),
                    &[
                        ("root_code", err.root().code().code()),
                        ("states", states.as_str()),
                    ],
                );
            }
        }

        (result, trace)
    }

    async fn run(&self, query: &ApprovedQuery, trace: &mut ExecutionTrace) -> ExecutorResult<Vec<Row>> {
        trace.advance(ExecutionState::Connecting);

        let mut conn = match self.source.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                trace.advance(ExecutionState::Done);
                return Err(ExecutorError::ConnectionAcquisitionFailed(err));
            }
        };

        let result = match conn.begin_read_only().await {
            Ok(()) => {
                trace.advance(ExecutionState::InTransaction);
                self.in_transaction(conn.as_mut(), query, trace).await
            }
            Err(err) => Err(ExecutorError::TransactionBeginFailed(err)),
        };

        let result = match conn.release().await {
            Ok(()) => result,
            Err(release) => Err(ExecutorError::ConnectionReleaseFailed {
                release,
                prior: result.err().map(Box::new),
            }),
        };

        trace.advance(ExecutionState::Done);
        result
    }

    /// Everything between a successful begin and release
    async fn in_transaction(
        &self,
        conn: &mut dyn Connection,
        query: &ApprovedQuery,
        trace: &mut ExecutionTrace,
    ) -> ExecutorResult<Vec<Row>> {
        let failure = match self.run_statement(conn, query).await {
            Ok(rows) => {
                trace.advance(ExecutionState::Committing);
                match conn.commit().await {
                    Ok(()) => return Ok(rows),
                    Err(err) => ExecutorError::TransactionCommitFailed(err),
                }
            }
            Err(err) => err,
        };

        trace.advance(ExecutionState::Failed);
        trace.advance(ExecutionState::RollingBack);
        match conn.rollback().await {
            Ok(()) => Err(failure),
            Err(rollback) => Err(ExecutorError::TransactionRollbackFailed {
                rollback,
                original: Box::new(failure),
            }),
        }
    }

    async fn run_statement(
        &self,
        conn: &mut dyn Connection,
        query: &ApprovedQuery,
    ) -> ExecutorResult<Vec<Row>> {
        conn.set_statement_timeout(self.config.statement_timeout())
            .await
            .map_err(ExecutorError::QueryExecutionFailed)?;

        let timeout_ms = self.config.statement_timeout_ms;
        let call = conn.execute(query.sql(), query.params());
        match tokio::time::timeout(self.config.client_deadline(), call).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(err)) => Err(ExecutorError::from_query(err, timeout_ms)),
            Err(_) => Err(ExecutorError::StatementTimeoutExceeded {
                timeout_ms,
                engine: None,
            }),
        }
    }
}

impl std::fmt::Debug for BoundedReadExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedReadExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
