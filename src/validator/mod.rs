//! Query validator subsystem
//!
//! Turns an untrusted SQL statement plus a tenant identifier into an
//! [`ApprovedQuery`] that is provably:
//!
//! - read-only: a single SELECT with no mutating, DDL or session keyword
//! - tenant-scoped: exactly one `<tenant column> = ?` conjunct whenever a
//!   tenant-owned relation is referenced, filtering that relation
//! - bounded: exactly one outer `LIMIT` no larger than the configured cap
//! - well-formed: balanced parentheses and quotes, no doubled keywords,
//!   commas or operators
//!
//! # Design Principles
//!
//! - Pure: no I/O, no state, byte-identical output for identical input
//! - Token-based: one lexing pass with the `sqlparser` PostgreSQL tokenizer;
//!   no check runs over raw substrings. Relation aliases are resolved from
//!   the parsed statement, and the rewritten statement must parse.
//! - Fail closed: anything that cannot be proven safe is rejected, never
//!   repaired

mod approved;
mod errors;
mod explain;
mod grammar;
mod lexer;
mod limit;
mod sanity;
mod scoping;
mod sources;
mod validator;

pub use approved::{ApprovedQuery, Param, RawQueryRequest};
pub use errors::{
    LimitViolation, ScopeViolation, SyntaxViolation, ValidatorError, ValidatorErrorCode,
    ValidatorResult,
};
pub use explain::RewriteExplanation;
pub use grammar::GrammarConfig;
pub use lexer::{tokenize, Token, TokenKind};
pub use limit::LimitAction;
pub use scoping::ScopeAction;
pub use validator::QueryValidator;
