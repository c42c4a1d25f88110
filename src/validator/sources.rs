//! Outer FROM-clause sources
//!
//! Parses the statement with `sqlparser` and lists what the outer SELECT
//! reads from, flattening joins and nested joins. Each source carries the
//! name the outer query resolves it by, so a qualified tenant predicate can
//! be tied to the relation it actually filters.

use sqlparser::ast::{Ident, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use super::errors::{SyntaxViolation, ValidatorError, ValidatorResult};
use super::lexer::{Token, TokenKind};

/// Stand-in for every parameter marker while parsing
const PARSE_MARKER: &str = "$1";

/// One relation in the outer FROM clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Source {
    /// Base table name, `None` for derived tables and table functions
    pub table: Option<String>,
    /// Name columns are qualified with, folded the way the engine folds it
    pub visible: Option<String>,
    /// `visible` as SQL text, quoting preserved
    pub qualifier: Option<String>,
}

impl Source {
    /// Whether `name` (already folded) is how this source is referenced
    pub fn is_named(&self, name: &str) -> bool {
        self.visible.as_deref() == Some(name)
    }
}

/// Parse the token sequence as exactly one statement
pub(crate) fn parse(tokens: &[Token]) -> ValidatorResult<Statement> {
    let text = parse_text(tokens);
    let mut statements = Parser::parse_sql(&PostgreSqlDialect {}, &text)
        .map_err(|err| ValidatorError::syntax(SyntaxViolation::Unparseable(err.to_string())))?;
    if statements.len() != 1 {
        return Err(ValidatorError::syntax(SyntaxViolation::Unparseable(format!(
            "expected one statement, found {}",
            statements.len()
        ))));
    }
    Ok(statements.remove(0))
}

/// Sources of the outer SELECT, in FROM order. Empty when the statement
/// has no plain outer SELECT.
pub(crate) fn outer(tokens: &[Token]) -> ValidatorResult<Vec<Source>> {
    let statement = parse(tokens)?;
    let Statement::Query(query) = &statement else {
        return Ok(Vec::new());
    };
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Ok(Vec::new());
    };

    let mut sources = Vec::new();
    for table in &select.from {
        collect(table, &mut sources);
    }
    Ok(sources)
}

fn collect(table: &TableWithJoins, out: &mut Vec<Source>) {
    collect_factor(&table.relation, out);
    for join in &table.joins {
        collect_factor(&join.relation, out);
    }
}

fn collect_factor(factor: &TableFactor, out: &mut Vec<Source>) {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            // Last name part, rendered as SQL so schema prefixes drop away
            let table_sql = name.0.last().map(|part| part.to_string());
            let table = table_sql.as_deref().map(fold_sql);
            let (visible, qualifier) = match alias {
                Some(alias) => (Some(fold(&alias.name)), Some(alias.name.to_string())),
                None => (table.clone(), table_sql),
            };
            out.push(Source {
                table,
                visible,
                qualifier,
            });
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => collect(table_with_joins, out),
        TableFactor::Derived { alias, .. } => out.push(Source {
            table: None,
            visible: alias.as_ref().map(|a| fold(&a.name)),
            qualifier: alias.as_ref().map(|a| a.name.to_string()),
        }),
        _ => out.push(Source {
            table: None,
            visible: None,
            qualifier: None,
        }),
    }
}

/// Engine folding: unquoted names are case-insensitive
fn fold(ident: &Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_lowercase(),
    }
}

/// [`fold`] for an identifier already rendered as SQL
fn fold_sql(sql: &str) -> String {
    match sql.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => sql.to_lowercase(),
    }
}

/// Tokens as parser input on one line, comments dropped and every marker
/// replaced by a positional one
fn parse_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens.iter().filter(|t| t.kind != TokenKind::Comment) {
        if !out.is_empty() && token.space_before {
            out.push(' ');
        }
        if token.is_marker() {
            out.push_str(PARSE_MARKER);
        } else {
            out.push_str(&token.text);
        }
    }
    out
}
