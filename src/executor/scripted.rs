//! Scripted in-memory engine
//!
//! A [`ConnectionSource`] whose per-step outcomes are fixed up front and
//! whose calls are counted. Clones share the same script and counters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::engine::{BoxFuture, Connection, ConnectionSource, EngineError, EngineResult, Row};
use crate::validator::Param;

/// One engine capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Acquire,
    Begin,
    SetTimeout,
    Execute,
    Commit,
    Rollback,
    Release,
}

/// A statement as the engine received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Param>,
}

#[derive(Debug, Default)]
struct Script {
    rows: Vec<Row>,
    failures: HashMap<Step, EngineError>,
    execute_delay: Option<Duration>,
    calls: HashMap<Step, usize>,
    executed: Vec<ExecutedStatement>,
    last_timeout: Option<Duration>,
    open: usize,
}

impl Script {
    /// Count the call and return its scripted outcome
    fn call(&mut self, step: Step) -> EngineResult<()> {
        *self.calls.entry(step).or_insert(0) += 1;
        match self.failures.get(&step) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    /// An engine where every step succeeds and queries return no rows
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by every successful execute
    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        self.lock().rows = rows;
        self
    }

    /// Make every call to `step` fail with `err`
    pub fn fail_at(self, step: Step, err: EngineError) -> Self {
        self.lock().failures.insert(step, err);
        self
    }

    /// Delay execute by `delay` before it answers
    pub fn with_execute_delay(self, delay: Duration) -> Self {
        self.lock().execute_delay = Some(delay);
        self
    }

    /// How many times `step` was attempted, failures included
    pub fn calls(&self, step: Step) -> usize {
        self.lock().calls.get(&step).copied().unwrap_or(0)
    }

    /// Statements passed to execute, in call order
    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.lock().executed.clone()
    }

    /// Timeout from the most recent set-timeout call
    pub fn last_statement_timeout(&self) -> Option<Duration> {
        self.lock().last_timeout
    }

    /// Connections acquired and not yet released
    pub fn open_connections(&self) -> usize {
        self.lock().open
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConnectionSource for ScriptedEngine {
    fn acquire(&self) -> BoxFuture<'_, EngineResult<Box<dyn Connection>>> {
        let outcome = {
            let mut script = self.lock();
            script.call(Step::Acquire).map(|()| {
                script.open += 1;
            })
        };
        let script = Arc::clone(&self.script);
        Box::pin(async move {
            outcome?;
            Ok(Box::new(ScriptedConnection { script }) as Box<dyn Connection>)
        })
    }
}

struct ScriptedConnection {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnection {
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn step(&self, step: Step) -> BoxFuture<'static, EngineResult<()>> {
        let outcome = self.lock().call(step);
        Box::pin(async move { outcome })
    }
}

impl Connection for ScriptedConnection {
    fn begin_read_only(&mut self) -> BoxFuture<'_, EngineResult<()>> {
        self.step(Step::Begin)
    }

    fn set_statement_timeout(&mut self, timeout: Duration) -> BoxFuture<'_, EngineResult<()>> {
        let outcome = {
            let mut script = self.lock();
            script.last_timeout = Some(timeout);
            script.call(Step::SetTimeout)
        };
        Box::pin(async move { outcome })
    }

    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [Param],
    ) -> BoxFuture<'a, EngineResult<Vec<Row>>> {
        let (outcome, delay) = {
            let mut script = self.lock();
            script.executed.push(ExecutedStatement {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
            let rows = script.rows.clone();
            (script.call(Step::Execute).map(|()| rows), script.execute_delay)
        };
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            outcome
        })
    }

    fn commit(&mut self) -> BoxFuture<'_, EngineResult<()>> {
        self.step(Step::Commit)
    }

    fn rollback(&mut self) -> BoxFuture<'_, EngineResult<()>> {
        self.step(Step::Rollback)
    }

    fn release(self: Box<Self>) -> BoxFuture<'static, EngineResult<()>> {
        let outcome = {
            let mut script = self.lock();
            script.open = script.open.saturating_sub(1);
            script.call(Step::Release)
        };
        Box::pin(async move { outcome })
    }
}
