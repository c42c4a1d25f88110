//! Grammar configuration
//!
//! The denylist, the tenant-owned relation allow-list, the tenant column and
//! marker, and the limit cap are injected into the validator at construction.
//! Nothing here is a module constant the validator reaches for directly.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Grammar configuration, loadable from the `grammar` section of a config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarConfig {
    /// Mutating, DDL and session keywords rejected as whole words
    #[serde(default = "default_forbidden_keywords")]
    pub forbidden_keywords: Vec<String>,

    /// Relations whose rows are partitioned by the tenant column
    #[serde(default = "default_tenant_relations")]
    pub tenant_relations: Vec<String>,

    /// Column injected into the tenant predicate
    #[serde(default = "default_tenant_column")]
    pub tenant_column: String,

    /// Other spellings of the tenant column accepted in an existing predicate
    #[serde(default = "default_tenant_column_aliases")]
    pub tenant_column_aliases: Vec<String>,

    /// Named marker bound to the tenant identifier
    #[serde(default = "default_tenant_marker")]
    pub tenant_marker: String,

    /// Largest accepted `LIMIT`, also the appended bound
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,

    /// Clause keywords rendered upper-case in the approved statement
    #[serde(default = "default_canonical_keywords")]
    pub canonical_keywords: Vec<String>,
}

fn default_forbidden_keywords() -> Vec<String> {
    [
        "insert", "update", "delete", "alter", "drop", "truncate", "grant", "create", "copy",
        "call", "execute", "function", "sequence", "trigger", "vacuum", "analyze", "show", "set",
        "do", "into", "merge", "revoke", "lock", "reindex", "refresh", "listen", "notify",
        "prepare", "deallocate", "reset", "discard", "begin", "commit", "rollback", "savepoint",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_tenant_relations() -> Vec<String> {
    vec!["categories".to_string(), "entries".to_string()]
}

fn default_tenant_column() -> String {
    "user_id".to_string()
}

fn default_tenant_column_aliases() -> Vec<String> {
    vec!["userId".to_string()]
}

fn default_tenant_marker() -> String {
    ":userId".to_string()
}

fn default_max_limit() -> u64 {
    200
}

fn default_canonical_keywords() -> Vec<String> {
    [
        "select", "from", "where", "group", "order", "by", "having", "limit", "offset", "join",
        "inner", "left", "right", "full", "outer", "cross", "on", "union", "intersect", "except",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            forbidden_keywords: default_forbidden_keywords(),
            tenant_relations: default_tenant_relations(),
            tenant_column: default_tenant_column(),
            tenant_column_aliases: default_tenant_column_aliases(),
            tenant_marker: default_tenant_marker(),
            max_limit: default_max_limit(),
            canonical_keywords: default_canonical_keywords(),
        }
    }
}

impl GrammarConfig {
    /// Replace the tenant-owned relation list
    pub fn with_tenant_relations(mut self, relations: &[&str]) -> Self {
        self.tenant_relations = relations.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Replace the denylist
    pub fn with_forbidden_keywords(mut self, keywords: &[&str]) -> Self {
        self.forbidden_keywords = keywords.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set the tenant column and the alternative spellings accepted as the
    /// same column in an existing predicate. Injection always uses `column`.
    pub fn with_tenant_column(mut self, column: &str, aliases: &[&str]) -> Self {
        self.tenant_column = column.to_string();
        self.tenant_column_aliases = aliases.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set the named marker standing for the tenant id, e.g. `:ownerId`
    pub fn with_tenant_marker(mut self, marker: &str) -> Self {
        self.tenant_marker = marker.to_string();
        self
    }

    /// Set the row cap
    pub fn with_max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// Check the configuration is usable; returns a description of the
    /// first problem found
    pub fn check(&self) -> Result<(), String> {
        if self.tenant_column.trim().is_empty() {
            return Err("tenant_column must not be empty".to_string());
        }
        let name = self.tenant_marker.strip_prefix(':').unwrap_or("");
        let well_formed = name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !well_formed {
            return Err(format!(
                "tenant_marker must look like ':name', got '{}'",
                self.tenant_marker
            ));
        }
        if self.max_limit == 0 {
            return Err("max_limit must be greater than zero".to_string());
        }
        if self
            .forbidden_keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case("select"))
        {
            return Err("forbidden_keywords must not contain 'select'".to_string());
        }
        Ok(())
    }
}

/// Lookup tables compiled once from a [`GrammarConfig`]
#[derive(Debug, Clone)]
pub(crate) struct Grammar {
    forbidden: HashSet<String>,
    relations: HashSet<String>,
    tenant_columns: HashSet<String>,
    canonical: HashSet<String>,
    pub tenant_column: String,
    pub tenant_marker: String,
    pub max_limit: u64,
}

impl Grammar {
    pub fn compile(config: &GrammarConfig) -> Self {
        let lower = |items: &[String]| -> HashSet<String> {
            items.iter().map(|s| s.to_ascii_lowercase()).collect()
        };

        let mut tenant_columns = lower(&config.tenant_column_aliases);
        tenant_columns.insert(config.tenant_column.to_ascii_lowercase());

        Self {
            forbidden: lower(&config.forbidden_keywords),
            relations: lower(&config.tenant_relations),
            tenant_columns,
            canonical: lower(&config.canonical_keywords),
            tenant_column: config.tenant_column.clone(),
            tenant_marker: config.tenant_marker.clone(),
            max_limit: config.max_limit,
        }
    }

    pub fn is_forbidden(&self, word: &str) -> bool {
        self.forbidden.contains(&word.to_ascii_lowercase())
    }

    pub fn is_tenant_relation(&self, name: &str) -> bool {
        self.relations.contains(&name.to_ascii_lowercase())
    }

    pub fn is_tenant_column(&self, name: &str) -> bool {
        self.tenant_columns.contains(&name.to_ascii_lowercase())
    }

    pub fn is_canonical(&self, word: &str) -> bool {
        self.canonical.contains(&word.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GrammarConfig::default();
        assert_eq!(config.max_limit, 200);
        assert_eq!(config.tenant_column, "user_id");
        assert_eq!(config.tenant_marker, ":userId");
        assert!(config.forbidden_keywords.iter().any(|k| k == "vacuum"));
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: GrammarConfig =
            serde_json::from_str(r#"{"tenant_relations": ["ledgers"], "max_limit": 50}"#).unwrap();
        assert_eq!(config.tenant_relations, vec!["ledgers".to_string()]);
        assert_eq!(config.max_limit, 50);
        assert_eq!(config.tenant_column, "user_id");
    }

    #[test]
    fn test_check_rejects_bad_marker() {
        let config = GrammarConfig::default().with_tenant_marker("userId");
        assert!(config.check().is_err());

        let config = GrammarConfig::default().with_tenant_marker(":1abc");
        assert!(config.check().is_err());
    }

    #[test]
    fn test_check_rejects_zero_limit() {
        let config = GrammarConfig::default().with_max_limit(0);
        assert!(config.check().is_err());
    }

    #[test]
    fn test_compiled_lookups_are_case_insensitive() {
        let grammar = Grammar::compile(&GrammarConfig::default());
        assert!(grammar.is_forbidden("DROP"));
        assert!(grammar.is_tenant_relation("Entries"));
        assert!(grammar.is_tenant_column("USERID"));
        assert!(grammar.is_tenant_column("user_id"));
        assert!(!grammar.is_forbidden("drop_log"));
    }
}
