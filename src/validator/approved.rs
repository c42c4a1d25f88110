//! Request and approved-query types

use serde::{Deserialize, Serialize};

/// Untrusted input: one statement plus the requesting tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQueryRequest {
    /// SQL text, arbitrary case and whitespace
    pub text: String,

    /// Tenant asserted by the authenticated request layer.
    /// Only ever bound as a parameter, never spliced into SQL.
    #[serde(alias = "tenantId")]
    pub tenant_id: String,
}

impl RawQueryRequest {
    /// Request for `text` on behalf of `tenant_id`
    pub fn new(text: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// Positional parameter bound by the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Param {
    /// The requesting tenant's identifier
    Tenant(String),
}

impl Param {
    pub fn as_str(&self) -> &str {
        match self {
            Param::Tenant(id) => id,
        }
    }
}

/// A statement the validator has proven read-only, tenant-scoped and bounded.
///
/// Only the validator constructs this type, so holding one is the proof.
/// It has no `Deserialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovedQuery {
    sql: String,
    params: Vec<Param>,
}

impl ApprovedQuery {
    pub(crate) fn new(sql: String, params: Vec<Param>) -> Self {
        Self { sql, params }
    }

    /// Rewritten statement using `?` positional markers
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameters in marker order
    pub fn params(&self) -> &[Param] {
        &self.params
    }
}
