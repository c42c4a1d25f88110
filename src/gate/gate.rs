//! The chained validate-then-execute facade

use std::sync::Arc;

use super::errors::GateResult;
use crate::config::{ConfigError, GateConfig};
use crate::executor::{BoundedReadExecutor, ConnectionSource, ExecutorError, Row};
use crate::observability::{GateMetrics, Logger, MetricsSnapshot};
use crate::validator::{ApprovedQuery, QueryValidator, RawQueryRequest};

/// Validator and executor wired together.
///
/// Shared across requests; the only mutable state is the atomic counters.
#[derive(Debug)]
pub struct SqlGate {
    validator: QueryValidator,
    executor: BoundedReadExecutor,
    metrics: GateMetrics,
}

impl SqlGate {
    /// Wire a gate from `config` over `source`.
    ///
    /// Refuses an unusable configuration (zero row cap, malformed tenant
    /// marker, zero statement timeout) instead of serving with it.
    pub fn new(
        config: GateConfig,
        source: Arc<dyn ConnectionSource>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            validator: QueryValidator::new(config.grammar)?,
            executor: BoundedReadExecutor::new(source, config.executor)?,
            metrics: GateMetrics::new(),
        })
    }

    /// The validating half
    pub fn validator(&self) -> &QueryValidator {
        &self.validator
    }

    /// The executing half
    pub fn executor(&self) -> &BoundedReadExecutor {
        &self.executor
    }

    /// Current counter values
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Validate only
    pub fn approve(&self, request: &RawQueryRequest) -> GateResult<ApprovedQuery> {
        match self.validator.validate_request(request) {
            Ok(approved) => {
                self.metrics.increment_validated();
                let param_count = approved.params().len().to_string();
                Logger::trace("QUERY_APPROVED", &[("param_count", param_count.as_str())]);
                Ok(approved)
            }
            Err(err) => {
                self.metrics.increment_rejected();
                Logger::warn(
                    "QUERY_REJECTED",
                    &[
                        ("code", err.code().code()),
                        ("subreason", err.subreason().unwrap_or("none")),
                    ],
                );
                Err(err.into())
            }
        }
    }

    /// Validate, then execute. A rejected statement never reaches the engine.
    pub async fn run(&self, request: &RawQueryRequest) -> GateResult<Vec<Row>> {
        let approved = self.approve(request)?;

        let (result, trace) = self.executor.execute_with_trace(&approved).await;
        if trace.rolled_back() {
            self.metrics.increment_rollbacks();
        }

        match result {
            Ok(rows) => {
                self.metrics.increment_executed();
                Ok(rows)
            }
            Err(err) => {
                self.metrics.increment_failed();
                if err.is_timeout() {
                    self.metrics.increment_timed_out();
                }
                if rollback_failed(&err) {
                    self.metrics.increment_rollback_failures();
                }
                Err(err.into())
            }
        }
    }
}

fn rollback_failed(err: &ExecutorError) -> bool {
    match err {
        ExecutorError::TransactionRollbackFailed { .. } => true,
        ExecutorError::ConnectionReleaseFailed {
            prior: Some(prior), ..
        } => rollback_failed(prior),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{EngineError, ScriptedEngine, Step};
    use crate::gate::GateError;

    fn gate(engine: &ScriptedEngine) -> SqlGate {
        SqlGate::new(GateConfig::default(), Arc::new(engine.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_rejection_never_reaches_engine() {
        let engine = ScriptedEngine::new();
        let gate = gate(&engine);

        let err = gate
            .run(&RawQueryRequest::new("DELETE FROM entries", "u1"))
            .await
            .unwrap_err();

        assert!(err.is_rejection());
        assert_eq!(engine.calls(Step::Acquire), 0);
        assert_eq!(gate.metrics().rejected, 1);
        assert_eq!(gate.metrics().validated, 0);
    }

    #[tokio::test]
    async fn test_run_executes_rewritten_sql() {
        let engine = ScriptedEngine::new();
        let gate = gate(&engine);

        gate.run(&RawQueryRequest::new(
            "select name, amount from entries order by date desc",
            "u42",
        ))
        .await
        .unwrap();

        let executed = engine.executed();
        assert_eq!(
            executed[0].sql,
            "SELECT name, amount FROM entries WHERE user_id = ? ORDER BY date desc LIMIT 200"
        );
        assert_eq!(gate.metrics().validated, 1);
        assert_eq!(gate.metrics().executed, 1);
    }

    #[tokio::test]
    async fn test_failure_metrics() {
        let engine = ScriptedEngine::new()
            .fail_at(Step::Execute, EngineError::timeout("canceled"))
            .fail_at(Step::Rollback, EngineError::connectivity("gone"));
        let gate = gate(&engine);

        let err = gate
            .run(&RawQueryRequest::new("SELECT * FROM entries", "u1"))
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Execution(_)));
        assert_eq!(err.status_code(), 504);
        let metrics = gate.metrics();
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.timed_out, 1);
        assert_eq!(metrics.rollbacks, 1);
        assert_eq!(metrics.rollback_failures, 1);
        assert_eq!(metrics.executed, 0);
    }

    #[test]
    fn test_unusable_config_refused() {
        let engine = ScriptedEngine::new();
        let mut config = GateConfig::default();
        config.grammar.max_limit = 0;
        let err = SqlGate::new(config, Arc::new(engine.clone())).unwrap_err();
        assert_eq!(err.code(), "SQLGATE_CONFIG_INVALID");

        let mut config = GateConfig::default();
        config.grammar.tenant_marker = String::new();
        assert!(SqlGate::new(config, Arc::new(engine.clone())).is_err());

        let mut config = GateConfig::default();
        config.executor.statement_timeout_ms = 0;
        assert!(SqlGate::new(config, Arc::new(engine)).is_err());
    }
}
