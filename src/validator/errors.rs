//! Validator error types
//!
//! Error codes:
//! - SQLGATE_REJECTED_STATEMENT_KIND (REJECT)
//! - SQLGATE_REJECTED_FORBIDDEN_KEYWORD (REJECT)
//! - SQLGATE_REJECTED_MULTIPLE_STATEMENTS (REJECT)
//! - SQLGATE_REJECTED_MALFORMED_SYNTAX (REJECT)
//! - SQLGATE_REJECTED_TENANT_SCOPE (REJECT)
//! - SQLGATE_REJECTED_LIMIT (REJECT)
//!
//! Every rejection is deterministic and local. None is retried.

use std::fmt;

use thiserror::Error;

/// Result type for validation
pub type ValidatorResult<T> = Result<T, ValidatorError>;

/// Validator error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorErrorCode {
    /// Statement does not begin with SELECT
    RejectedStatementKind,
    /// Denylisted keyword present as a whole word
    RejectedForbiddenKeyword,
    /// Statement separator present
    RejectedMultipleStatements,
    /// Syntax sanity pass failed
    RejectedMalformedSyntax,
    /// Statement cannot be scoped to exactly one tenant
    RejectedTenantScope,
    /// Limit missing a literal bound, nested, repeated or above the cap
    RejectedLimit,
}

impl ValidatorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::RejectedStatementKind => "SQLGATE_REJECTED_STATEMENT_KIND",
            Self::RejectedForbiddenKeyword => "SQLGATE_REJECTED_FORBIDDEN_KEYWORD",
            Self::RejectedMultipleStatements => "SQLGATE_REJECTED_MULTIPLE_STATEMENTS",
            Self::RejectedMalformedSyntax => "SQLGATE_REJECTED_MALFORMED_SYNTAX",
            Self::RejectedTenantScope => "SQLGATE_REJECTED_TENANT_SCOPE",
            Self::RejectedLimit => "SQLGATE_REJECTED_LIMIT",
        }
    }
}

impl fmt::Display for ValidatorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Sub-reason of a malformed-syntax rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxViolation {
    UnbalancedParentheses,
    UnbalancedSingleQuotes,
    UnbalancedDoubleQuotes,
    /// Same clause keyword twice in a row
    DuplicateKeyword(String),
    DoubledComma,
    /// Comparison operator outside `= < > <= >= <> !=`, or two in a row
    MalformedOperator(String),
    /// Clause keyword with no condition after it
    EmptyClause(String),
    Comment,
    UnexpectedCharacter(String),
    /// Rejected by the SQL parser
    Unparseable(String),
}

impl SyntaxViolation {
    /// Machine-checkable sub-reason
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnbalancedParentheses => "unbalanced_parentheses",
            Self::UnbalancedSingleQuotes => "unbalanced_single_quotes",
            Self::UnbalancedDoubleQuotes => "unbalanced_double_quotes",
            Self::DuplicateKeyword(_) => "duplicate_keyword",
            Self::DoubledComma => "doubled_comma",
            Self::MalformedOperator(_) => "malformed_operator",
            Self::EmptyClause(_) => "empty_clause",
            Self::Comment => "comment",
            Self::UnexpectedCharacter(_) => "unexpected_character",
            Self::Unparseable(_) => "unparseable",
        }
    }
}

impl fmt::Display for SyntaxViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnbalancedParentheses => write!(f, "parentheses are not balanced"),
            Self::UnbalancedSingleQuotes => write!(f, "single quotes are not balanced"),
            Self::UnbalancedDoubleQuotes => write!(f, "double quotes are not balanced"),
            Self::DuplicateKeyword(kw) => write!(f, "keyword {} repeated", kw.to_uppercase()),
            Self::DoubledComma => write!(f, "doubled comma"),
            Self::MalformedOperator(op) => write!(f, "malformed operator '{}'", op),
            Self::EmptyClause(kw) => write!(f, "{} has no condition", kw.to_uppercase()),
            Self::Comment => write!(f, "comments are not allowed"),
            Self::UnexpectedCharacter(c) => write!(f, "unexpected character '{}'", c),
            Self::Unparseable(msg) => write!(f, "statement does not parse: {}", msg),
        }
    }
}

/// Sub-reason of a tenant-scope rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeViolation {
    EmptyTenant,
    /// Marker other than the tenant marker
    UnsupportedParameter(String),
    /// Tenant marker not part of a tenant predicate
    StrayMarker,
    DuplicatePredicate,
    /// Existing predicate outside the top-level WHERE
    PredicateOutsideWhere,
    /// Existing predicate under OR, NOT or a wider expression
    PredicateNotConjunctive,
    /// Tenant-owned relation inside a subquery
    RelationInSubquery(String),
    /// Set operation next to a tenant-owned relation
    CompoundQuery,
    /// More than one tenant-owned relation in the outer FROM
    MultipleTenantRelations,
    /// Existing predicate qualified by something other than the tenant
    /// relation
    ForeignQualifier(String),
    /// Unqualified existing predicate while the outer FROM reads several
    /// sources
    UnqualifiedPredicate,
}

impl ScopeViolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyTenant => "empty_tenant",
            Self::UnsupportedParameter(_) => "unsupported_parameter",
            Self::StrayMarker => "stray_marker",
            Self::DuplicatePredicate => "duplicate_predicate",
            Self::PredicateOutsideWhere => "predicate_outside_where",
            Self::PredicateNotConjunctive => "predicate_not_conjunctive",
            Self::RelationInSubquery(_) => "relation_in_subquery",
            Self::CompoundQuery => "compound_query",
            Self::MultipleTenantRelations => "multiple_tenant_relations",
            Self::ForeignQualifier(_) => "foreign_qualifier",
            Self::UnqualifiedPredicate => "unqualified_predicate",
        }
    }
}

impl fmt::Display for ScopeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTenant => write!(f, "tenant identifier is empty"),
            Self::UnsupportedParameter(m) => write!(f, "unsupported parameter marker '{}'", m),
            Self::StrayMarker => write!(f, "tenant marker used outside a tenant predicate"),
            Self::DuplicatePredicate => write!(f, "more than one tenant predicate"),
            Self::PredicateOutsideWhere => {
                write!(f, "tenant predicate must sit in the top-level WHERE clause")
            }
            Self::PredicateNotConjunctive => {
                write!(f, "tenant predicate must be a top-level AND conjunct")
            }
            Self::RelationInSubquery(r) => {
                write!(f, "tenant-owned relation '{}' referenced inside a subquery", r)
            }
            Self::CompoundQuery => {
                write!(f, "set operations cannot be combined with tenant-owned relations")
            }
            Self::MultipleTenantRelations => {
                write!(f, "one tenant predicate cannot scope several tenant-owned relations")
            }
            Self::ForeignQualifier(q) => {
                write!(f, "tenant predicate qualifier '{}' does not name the tenant-owned relation", q)
            }
            Self::UnqualifiedPredicate => {
                write!(f, "tenant predicate must be qualified when several relations are read")
            }
        }
    }
}

/// Sub-reason of a limit rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitViolation {
    Exceeded { requested: u64, max: u64 },
    NotLiteral,
    Nested,
    Multiple,
    /// `FETCH FIRST` in place of `LIMIT`
    Fetch,
}

impl LimitViolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exceeded { .. } => "exceeded",
            Self::NotLiteral => "not_literal",
            Self::Nested => "nested",
            Self::Multiple => "multiple",
            Self::Fetch => "fetch",
        }
    }
}

impl fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exceeded { requested, max } => {
                write!(f, "LIMIT {} exceeds the maximum of {}", requested, max)
            }
            Self::NotLiteral => write!(f, "LIMIT bound must be an integer literal"),
            Self::Nested => write!(f, "LIMIT is only allowed on the outer query"),
            Self::Multiple => write!(f, "more than one LIMIT clause"),
            Self::Fetch => write!(f, "row bounds must be given with LIMIT, not FETCH"),
        }
    }
}

/// Validation rejection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    #[error("query must begin with SELECT")]
    RejectedStatementKind {
        /// First token of the statement, if any
        found: Option<String>,
    },

    #[error("forbidden keyword '{keyword}'")]
    RejectedForbiddenKeyword { keyword: String },

    #[error("only a single statement is allowed")]
    RejectedMultipleStatements,

    #[error("malformed syntax: {0}")]
    RejectedMalformedSyntax(SyntaxViolation),

    #[error("tenant scoping: {0}")]
    RejectedTenantScope(ScopeViolation),

    #[error("limit: {0}")]
    RejectedLimit(LimitViolation),
}

impl ValidatorError {
    /// Stable rejection code
    pub fn code(&self) -> ValidatorErrorCode {
        match self {
            Self::RejectedStatementKind { .. } => ValidatorErrorCode::RejectedStatementKind,
            Self::RejectedForbiddenKeyword { .. } => ValidatorErrorCode::RejectedForbiddenKeyword,
            Self::RejectedMultipleStatements => ValidatorErrorCode::RejectedMultipleStatements,
            Self::RejectedMalformedSyntax(_) => ValidatorErrorCode::RejectedMalformedSyntax,
            Self::RejectedTenantScope(_) => ValidatorErrorCode::RejectedTenantScope,
            Self::RejectedLimit(_) => ValidatorErrorCode::RejectedLimit,
        }
    }

    /// Machine-checkable sub-reason, when the code has one
    pub fn subreason(&self) -> Option<&'static str> {
        match self {
            Self::RejectedMalformedSyntax(v) => Some(v.as_str()),
            Self::RejectedTenantScope(v) => Some(v.as_str()),
            Self::RejectedLimit(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub(crate) fn syntax(violation: SyntaxViolation) -> Self {
        Self::RejectedMalformedSyntax(violation)
    }

    pub(crate) fn scope(violation: ScopeViolation) -> Self {
        Self::RejectedTenantScope(violation)
    }

    pub(crate) fn limit(violation: LimitViolation) -> Self {
        Self::RejectedLimit(violation)
    }
}
