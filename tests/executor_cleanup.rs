//! Executor cleanup tests
//!
//! For every step that can fail, the executor must:
//! 1. Roll back exactly once if the transaction had begun
//! 2. Release exactly once if a connection was acquired
//! 3. Return the failure that started the unhappy path
//! 4. Never commit after a failure

use std::sync::Arc;
use std::time::Duration;

use sqlgate::executor::{
    BoundedReadExecutor, EngineError, ExecutionState, ExecutorConfig, ExecutorError,
    ExecutorErrorCode, Row, ScalarValue, ScriptedEngine, Step,
};
use sqlgate::validator::{ApprovedQuery, QueryValidator};

fn approved() -> ApprovedQuery {
    QueryValidator::default()
        .validate("SELECT * FROM categories WHERE userId = :userId", "u1")
        .unwrap()
}

fn executor(engine: &ScriptedEngine) -> BoundedReadExecutor {
    BoundedReadExecutor::new(Arc::new(engine.clone()), ExecutorConfig::default()).unwrap()
}

fn sample_rows() -> Vec<Row> {
    (1..=3)
        .map(|id| {
            let mut row = Row::new();
            row.insert("id".to_string(), ScalarValue::Int(id));
            row.insert("name".to_string(), ScalarValue::Text(format!("category-{}", id)));
            row
        })
        .collect()
}

// =============================================================================
// FAILURE AFTER BEGIN
// =============================================================================

/// Execute throws after a successful begin: one rollback, one release, the
/// original error rethrown.
#[tokio::test]
async fn test_execute_failure_rolls_back_and_releases_once() {
    let original = EngineError::connectivity("connection reset by peer");
    let engine = ScriptedEngine::new().fail_at(Step::Execute, original.clone());

    let err = executor(&engine).execute(&approved()).await.unwrap_err();

    assert_eq!(err, ExecutorError::QueryExecutionFailed(original));
    assert_eq!(engine.calls(Step::Begin), 1);
    assert_eq!(engine.calls(Step::Rollback), 1);
    assert_eq!(engine.calls(Step::Release), 1);
    assert_eq!(engine.calls(Step::Commit), 0);
    assert_eq!(engine.open_connections(), 0);
}

/// Every step after acquire: the connection is released exactly once.
#[tokio::test]
async fn test_release_happens_once_for_every_failing_step() {
    let steps = [
        (Step::Begin, ExecutorErrorCode::TransactionBeginFailed, 0),
        (Step::SetTimeout, ExecutorErrorCode::QueryExecutionFailed, 1),
        (Step::Execute, ExecutorErrorCode::QueryExecutionFailed, 1),
        (Step::Commit, ExecutorErrorCode::TransactionCommitFailed, 1),
        (Step::Rollback, ExecutorErrorCode::TransactionRollbackFailed, 0),
    ];

    for (step, expected, rollbacks) in steps {
        // A rollback only runs after an earlier failure
        let engine = if step == Step::Rollback {
            ScriptedEngine::new()
                .fail_at(Step::Execute, EngineError::other("boom"))
                .fail_at(Step::Rollback, EngineError::other("rollback refused"))
        } else {
            ScriptedEngine::new().fail_at(step, EngineError::other("boom"))
        };

        let err = executor(&engine).execute(&approved()).await.unwrap_err();

        assert_eq!(err.code(), expected, "step: {:?}", step);
        assert_eq!(engine.calls(Step::Release), 1, "step: {:?}", step);
        assert_eq!(engine.open_connections(), 0, "step: {:?}", step);
        if step != Step::Rollback {
            assert_eq!(engine.calls(Step::Rollback), rollbacks, "step: {:?}", step);
        }
    }
}

/// A failed rollback is reported with the failure that caused it, and the
/// release still runs.
#[tokio::test]
async fn test_rollback_failure_is_propagated_not_swallowed() {
    let engine = ScriptedEngine::new()
        .fail_at(Step::Commit, EngineError::connectivity("lost"))
        .fail_at(Step::Rollback, EngineError::connectivity("still lost"));

    let (result, trace) = executor(&engine).execute_with_trace(&approved()).await;
    let err = result.unwrap_err();

    assert_eq!(err.code(), ExecutorErrorCode::TransactionRollbackFailed);
    assert_eq!(err.root().code(), ExecutorErrorCode::TransactionCommitFailed);
    assert_eq!(engine.calls(Step::Release), 1);
    assert_eq!(
        trace.states(),
        &[
            ExecutionState::Idle,
            ExecutionState::Connecting,
            ExecutionState::InTransaction,
            ExecutionState::Committing,
            ExecutionState::Failed,
            ExecutionState::RollingBack,
            ExecutionState::Done,
        ]
    );
}

// =============================================================================
// TIMEOUTS
// =============================================================================

/// A hung engine is cut off by the client deadline and cleaned up.
#[tokio::test]
async fn test_hung_query_hits_client_deadline() {
    let engine = ScriptedEngine::new().with_execute_delay(Duration::from_secs(30));
    let executor = BoundedReadExecutor::new(
        Arc::new(engine.clone()),
        ExecutorConfig::default()
            .with_statement_timeout_ms(50)
            .with_deadline_grace_ms(50),
    )
    .unwrap();

    let err = executor.execute(&approved()).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(engine.last_statement_timeout(), Some(Duration::from_millis(50)));
    assert_eq!(engine.calls(Step::Rollback), 1);
    assert_eq!(engine.calls(Step::Release), 1);
    assert_eq!(engine.calls(Step::Commit), 0);
}

// =============================================================================
// SUCCESS
// =============================================================================

/// Success: one commit, one release, rows unchanged and in engine order.
#[tokio::test]
async fn test_success_returns_rows_unchanged() {
    let engine = ScriptedEngine::new().with_rows(sample_rows());

    let rows = executor(&engine).execute(&approved()).await.unwrap();

    assert_eq!(rows, sample_rows());
    assert_eq!(engine.calls(Step::Commit), 1);
    assert_eq!(engine.calls(Step::Release), 1);
    assert_eq!(engine.calls(Step::Rollback), 0);
}

/// Many concurrent executions each own their connection; none leak.
#[tokio::test]
async fn test_no_leak_under_concurrency() {
    let engine = ScriptedEngine::new().fail_at(Step::Execute, EngineError::other("boom"));
    let executor = executor(&engine);
    let query = approved();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let executor = executor.clone();
            let query = query.clone();
            tokio::spawn(async move { executor.execute(&query).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }

    assert_eq!(engine.calls(Step::Acquire), 16);
    assert_eq!(engine.calls(Step::Rollback), 16);
    assert_eq!(engine.calls(Step::Release), 16);
    assert_eq!(engine.open_connections(), 0);
}
