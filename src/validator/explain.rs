//! Rewrite explanation
//!
//! Deterministic, human-readable account of what validation did to a
//! statement, or why it was rejected.

use std::fmt;

use serde::Serialize;

use super::errors::ValidatorError;
use super::limit::LimitAction;
use super::validator::Rewrite;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteExplanation {
    pub accepted: bool,
    /// Approved statement (if accepted)
    pub sql: Option<String>,
    pub param_count: usize,
    /// INJECTED, ALREADY_SCOPED or NOT_REQUIRED
    pub scoping: Option<String>,
    pub tenant_relations: Vec<String>,
    /// APPENDED or KEPT
    pub limit_action: Option<String>,
    pub limit: Option<u64>,
    pub rejection_code: Option<String>,
    pub rejection_subreason: Option<String>,
    pub rejection_reason: Option<String>,
}

impl RewriteExplanation {
    pub(crate) fn accepted(rewrite: &Rewrite) -> Self {
        let limit_action = match rewrite.limit {
            LimitAction::Appended(_) => "APPENDED",
            LimitAction::Kept(_) => "KEPT",
        };
        Self {
            accepted: true,
            sql: Some(rewrite.query.sql().to_string()),
            param_count: rewrite.query.params().len(),
            scoping: Some(rewrite.scope.as_str().to_string()),
            tenant_relations: rewrite.relations.clone(),
            limit_action: Some(limit_action.to_string()),
            limit: Some(rewrite.limit.bound()),
            rejection_code: None,
            rejection_subreason: None,
            rejection_reason: None,
        }
    }

    pub(crate) fn rejected(err: &ValidatorError) -> Self {
        Self {
            accepted: false,
            sql: None,
            param_count: 0,
            scoping: None,
            tenant_relations: Vec::new(),
            limit_action: None,
            limit: None,
            rejection_code: Some(err.code().code().to_string()),
            rejection_subreason: err.subreason().map(str::to_string),
            rejection_reason: Some(err.to_string()),
        }
    }
}

impl fmt::Display for RewriteExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN REWRITE ===")?;

        if self.accepted {
            writeln!(f, "Status: ACCEPTED")?;
            if let Some(sql) = &self.sql {
                writeln!(f, "SQL: {}", sql)?;
            }
            writeln!(f, "Parameters: {}", self.param_count)?;
            if let Some(scoping) = &self.scoping {
                writeln!(f, "Tenant Scoping: {}", scoping)?;
            }
            if !self.tenant_relations.is_empty() {
                writeln!(f, "Tenant Relations:")?;
                for relation in &self.tenant_relations {
                    writeln!(f, "  - {}", relation)?;
                }
            }
            if let (Some(action), Some(limit)) = (&self.limit_action, self.limit) {
                writeln!(f, "Limit: {} ({})", limit, action)?;
            }
        } else {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(sub) = &self.rejection_subreason {
                writeln!(f, "Sub-reason: {}", sub)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
        }

        Ok(())
    }
}
