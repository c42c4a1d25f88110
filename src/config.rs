//! Gate configuration
//!
//! A single JSON file with two optional sections:
//!
//! ```json
//! {
//!   "grammar":  { "tenant_relations": ["categories", "entries"], "max_limit": 200 },
//!   "executor": { "statement_timeout_ms": 3000 }
//! }
//! ```
//!
//! Every field has a default, so `{}` is a valid configuration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::ExecutorConfig;
use crate::validator::GrammarConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "SQLGATE_CONFIG_UNREADABLE",
            ConfigError::Parse(_) => "SQLGATE_CONFIG_MALFORMED",
            ConfigError::Invalid(_) => "SQLGATE_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub grammar: GrammarConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl GateConfig {
    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON document
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: GateConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check both sections; the first problem found is reported
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grammar.check().map_err(ConfigError::Invalid)?;
        self.executor.check().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}
