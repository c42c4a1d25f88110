//! Tenant scoping rewrite
//!
//! A statement that touches a tenant-owned relation leaves this step with
//! exactly one predicate `<tenant column> = <tenant marker>`, and that
//! predicate is a top-level AND conjunct of the outer WHERE. Statements the
//! step cannot scope that way are rejected, never passed through.
//!
//! The predicate filters exactly one relation: the single tenant-owned
//! relation of the outer FROM clause. A qualified predicate must name that
//! relation or its alias; when the outer FROM reads several sources the
//! predicate must be qualified, and an injected one is.

use super::errors::{ScopeViolation, SyntaxViolation, ValidatorError, ValidatorResult};
use super::grammar::Grammar;
use super::lexer::{depths, Token, TokenKind};
use super::sanity;
use super::sources::{self, Source};

/// Top-level words that end a WHERE condition
const CLAUSE_BOUNDARIES: &[&str] = &[
    "group", "having", "window", "order", "limit", "offset", "fetch", "for", "union",
    "intersect", "except",
];

/// Top-level words a new WHERE is injected in front of
const TRAILING_CLAUSES: &[&str] = &[
    "group", "having", "window", "order", "limit", "offset", "fetch", "for",
];

const SET_OPERATIONS: &[&str] = &["union", "intersect", "except"];

/// What the scoping step did to the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeAction {
    /// A tenant predicate was added
    Injected,
    /// The statement already carried a valid tenant predicate
    AlreadyScoped,
    /// No tenant-owned relation is referenced
    NotRequired,
}

impl ScopeAction {
    /// Name used in explain output
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeAction::Injected => "INJECTED",
            ScopeAction::AlreadyScoped => "ALREADY_SCOPED",
            ScopeAction::NotRequired => "NOT_REQUIRED",
        }
    }
}

#[derive(Debug)]
pub(crate) struct ScopeOutcome {
    pub action: ScopeAction,
    /// Tenant-owned relations referenced, lower-case, in first-seen order
    pub relations: Vec<String>,
}

/// Position of a `<column> = <marker>` predicate
#[derive(Debug)]
struct Predicate {
    /// First token, the qualifier when the column is qualified
    start: usize,
    marker: usize,
    qualified: bool,
}

/// Scope `tokens` for `tenant_id`, injecting a predicate when one is
/// needed and missing
pub(crate) fn apply(
    grammar: &Grammar,
    tokens: &mut Vec<Token>,
    tenant_id: &str,
) -> ValidatorResult<ScopeOutcome> {
    if tenant_id.trim().is_empty() {
        return Err(ValidatorError::scope(ScopeViolation::EmptyTenant));
    }

    for token in tokens.iter() {
        let unsupported = match token.kind {
            TokenKind::NamedMarker => token.text != grammar.tenant_marker,
            TokenKind::PositionalMarker => token.text != "?",
            _ => false,
        };
        if unsupported {
            return Err(ValidatorError::scope(ScopeViolation::UnsupportedParameter(
                token.text.clone(),
            )));
        }
    }

    let predicates = find_predicates(grammar, tokens);
    let stray = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_marker())
        .any(|(i, _)| !predicates.iter().any(|p| p.marker == i));
    if stray {
        return Err(ValidatorError::scope(ScopeViolation::StrayMarker));
    }
    if predicates.len() > 1 {
        return Err(ValidatorError::scope(ScopeViolation::DuplicatePredicate));
    }

    let depth = depths(tokens);
    let in_subquery = subquery_mask(tokens);

    let mut relations: Vec<String> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let Some(name) = token.ident_name() else {
            continue;
        };
        if !grammar.is_tenant_relation(&name) {
            continue;
        }
        if in_subquery[i] {
            return Err(ValidatorError::scope(ScopeViolation::RelationInSubquery(name)));
        }
        let name = name.to_ascii_lowercase();
        if !relations.contains(&name) {
            relations.push(name);
        }
    }

    let has_set_operation = tokens
        .iter()
        .zip(&depth)
        .any(|(t, d)| *d == 0 && SET_OPERATIONS.iter().any(|op| t.is_word(op)));
    if !relations.is_empty() && has_set_operation {
        return Err(ValidatorError::scope(ScopeViolation::CompoundQuery));
    }

    let where_idx = (0..tokens.len()).find(|&i| depth[i] == 0 && tokens[i].is_word("where"));
    let where_end = where_idx.map(|w| {
        (w + 1..tokens.len())
            .find(|&i| depth[i] == 0 && CLAUSE_BOUNDARIES.iter().any(|b| tokens[i].is_word(b)))
            .unwrap_or(tokens.len())
    });
    if let (Some(w), Some(end)) = (where_idx, where_end) {
        if w + 1 == end {
            return Err(ValidatorError::syntax(SyntaxViolation::EmptyClause(
                "where".to_string(),
            )));
        }
    }

    if let Some(predicate) = predicates.first() {
        let (Some(w), Some(end)) = (where_idx, where_end) else {
            return Err(ValidatorError::scope(ScopeViolation::PredicateOutsideWhere));
        };
        if depth[predicate.start] != 0 || predicate.start <= w || predicate.marker >= end {
            return Err(ValidatorError::scope(ScopeViolation::PredicateOutsideWhere));
        }

        let before = predicate.start - 1;
        let conjunct_before = before == w
            || (tokens[before].is_word("and") && !closes_between(tokens, &depth, w, before));
        let conjunct_after =
            predicate.marker + 1 == end || tokens[predicate.marker + 1].is_word("and");
        if !conjunct_before || !conjunct_after || has_top_level_or(tokens, &depth, w, end) {
            return Err(ValidatorError::scope(ScopeViolation::PredicateNotConjunctive));
        }
    }

    if relations.is_empty() {
        let action = if predicates.is_empty() {
            ScopeAction::NotRequired
        } else {
            ScopeAction::AlreadyScoped
        };
        return Ok(ScopeOutcome { action, relations });
    }

    let from = outer_sources(tokens)?;
    let target = tenant_source(grammar, &from)?;

    if let Some(predicate) = predicates.first() {
        check_qualifier(tokens, predicate, target, from.len())?;
        return Ok(ScopeOutcome {
            action: ScopeAction::AlreadyScoped,
            relations,
        });
    }

    let qualifier = target
        .filter(|_| from.len() > 1)
        .and_then(|source| source.qualifier.as_deref());

    match (where_idx, where_end) {
        (Some(w), Some(end)) => {
            let wrap = has_top_level_or(tokens, &depth, w, end);
            let mut inserted = tenant_predicate(grammar, qualifier);
            inserted.push(Token::word("AND"));
            if wrap {
                inserted.push(Token::new(TokenKind::Punct, "(", true));
                tokens[w + 1].space_before = false;
                tokens.insert(end, Token::new(TokenKind::Punct, ")", false));
            }
            tokens.splice(w + 1..w + 1, inserted);
        }
        _ => {
            let at = (0..tokens.len())
                .find(|&i| depth[i] == 0 && TRAILING_CLAUSES.iter().any(|c| tokens[i].is_word(c)))
                .unwrap_or(tokens.len());
            let mut inserted = vec![Token::word("WHERE")];
            inserted.extend(tenant_predicate(grammar, qualifier));
            tokens.splice(at..at, inserted);
        }
    }

    Ok(ScopeOutcome {
        action: ScopeAction::Injected,
        relations,
    })
}

/// Outer FROM sources. A statement that does not parse reports the more
/// specific sanity violation when there is one.
fn outer_sources(tokens: &[Token]) -> ValidatorResult<Vec<Source>> {
    sources::outer(tokens).map_err(|err| sanity::check(tokens).err().unwrap_or(err))
}

/// The one tenant-owned source of the outer FROM, if any
fn tenant_source<'a>(grammar: &Grammar, from: &'a [Source]) -> ValidatorResult<Option<&'a Source>> {
    let mut owned = from.iter().filter(|source| {
        source
            .table
            .as_deref()
            .is_some_and(|table| grammar.is_tenant_relation(table))
    });
    let first = owned.next();
    if owned.next().is_some() {
        return Err(ValidatorError::scope(ScopeViolation::MultipleTenantRelations));
    }
    Ok(first)
}

/// A present predicate must filter the tenant-owned source
fn check_qualifier(
    tokens: &[Token],
    predicate: &Predicate,
    target: Option<&Source>,
    source_count: usize,
) -> ValidatorResult<()> {
    if !predicate.qualified {
        if target.is_some() && source_count > 1 {
            return Err(ValidatorError::scope(ScopeViolation::UnqualifiedPredicate));
        }
        return Ok(());
    }

    let qualifier = &tokens[predicate.start];
    let names_target = match (target, qualifier.folded_name()) {
        (Some(source), Some(name)) => source.is_named(&name),
        _ => false,
    };
    if !names_target {
        return Err(ValidatorError::scope(ScopeViolation::ForeignQualifier(
            qualifier.text.clone(),
        )));
    }
    Ok(())
}

/// `[qualifier.]<tenant column> = <tenant marker>`
fn tenant_predicate(grammar: &Grammar, qualifier: Option<&str>) -> Vec<Token> {
    let mut predicate = Vec::with_capacity(5);
    match qualifier {
        Some(qualifier) => {
            let kind = if qualifier.starts_with('"') {
                TokenKind::QuotedIdent
            } else {
                TokenKind::Word
            };
            predicate.push(Token::new(kind, qualifier, true));
            predicate.push(Token::new(TokenKind::Punct, ".", false));
            predicate.push(Token::new(TokenKind::Word, grammar.tenant_column.as_str(), false));
        }
        None => predicate.push(Token::word(&grammar.tenant_column)),
    }
    predicate.push(Token::new(TokenKind::Comparison, "=", true));
    predicate.push(Token::new(
        TokenKind::NamedMarker,
        grammar.tenant_marker.as_str(),
        true,
    ));
    predicate
}

fn is_tenant_marker(grammar: &Grammar, token: &Token) -> bool {
    match token.kind {
        TokenKind::NamedMarker => token.text == grammar.tenant_marker,
        TokenKind::PositionalMarker => token.text == "?",
        _ => false,
    }
}

/// Every `[qualifier .] column = marker` run naming the tenant column
fn find_predicates(grammar: &Grammar, tokens: &[Token]) -> Vec<Predicate> {
    let mut found = Vec::new();
    for i in 0..tokens.len() {
        let is_column = tokens[i]
            .ident_name()
            .is_some_and(|name| grammar.is_tenant_column(&name));
        if !is_column {
            continue;
        }
        let equals = tokens
            .get(i + 1)
            .is_some_and(|t| t.kind == TokenKind::Comparison && t.text == "=");
        let marker = tokens.get(i + 2).is_some_and(|t| is_tenant_marker(grammar, t));
        if !(equals && marker) {
            continue;
        }
        let qualified = i >= 2 && tokens[i - 1].is_punct('.') && tokens[i - 2].ident_name().is_some();
        found.push(Predicate {
            start: if qualified { i - 2 } else { i },
            marker: i + 2,
            qualified,
        });
    }
    found
}

/// Marks tokens enclosed (at any level) by a parenthesis opening a SELECT
fn subquery_mask(tokens: &[Token]) -> Vec<bool> {
    let mut stack: Vec<bool> = Vec::new();
    let mut mask = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        if token.is_punct('(') {
            mask.push(stack.iter().any(|s| *s));
            let opens_select = tokens.get(i + 1).is_some_and(|t| t.is_word("select"));
            stack.push(opens_select);
        } else if token.is_punct(')') {
            stack.pop();
            mask.push(stack.iter().any(|s| *s));
        } else {
            mask.push(stack.iter().any(|s| *s));
        }
    }
    mask
}

fn has_top_level_or(tokens: &[Token], depth: &[i32], start: usize, end: usize) -> bool {
    (start + 1..end).any(|i| depth[i] == 0 && tokens[i].is_word("or"))
}

/// Whether the AND at `and_idx` is the partner of a `BETWEEN`
fn closes_between(tokens: &[Token], depth: &[i32], where_idx: usize, and_idx: usize) -> bool {
    for i in (where_idx + 1..and_idx).rev() {
        if depth[i] != 0 {
            continue;
        }
        if tokens[i].is_word("between") {
            return true;
        }
        if tokens[i].is_word("and") || tokens[i].is_word("or") {
            return false;
        }
    }
    false
}
