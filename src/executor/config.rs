//! Executor configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Executor configuration, loadable from the `executor` section of a
/// config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Statement timeout set inside every transaction (default: 3000)
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,

    /// Extra time the client waits past the statement timeout before
    /// abandoning the call itself (default: 500)
    #[serde(default = "default_deadline_grace_ms")]
    pub deadline_grace_ms: u64,
}

fn default_statement_timeout_ms() -> u64 {
    3000
}

fn default_deadline_grace_ms() -> u64 {
    500
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            statement_timeout_ms: default_statement_timeout_ms(),
            deadline_grace_ms: default_deadline_grace_ms(),
        }
    }
}

impl ExecutorConfig {
    /// Set the per-transaction statement timeout
    pub fn with_statement_timeout_ms(mut self, ms: u64) -> Self {
        self.statement_timeout_ms = ms;
        self
    }

    /// Set how long past the statement timeout the client keeps waiting
    pub fn with_deadline_grace_ms(mut self, ms: u64) -> Self {
        self.deadline_grace_ms = ms;
        self
    }

    /// Statement timeout as a [`Duration`]
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    /// Client-side bound on the query call
    pub fn client_deadline(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms.saturating_add(self.deadline_grace_ms))
    }

    /// Check the configuration is usable; a zero timeout would disable the
    /// engine-side bound
    pub fn check(&self) -> Result<(), String> {
        if self.statement_timeout_ms == 0 {
            return Err("statement_timeout_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}
