//! Query validator
//!
//! Pure function from `(text, tenant_id)` to an [`ApprovedQuery`] or a
//! rejection. Steps run in a fixed order and the first rejection is final:
//!
//! 1. Lex and normalize (whitespace folded, clause keywords upper-cased);
//!    unterminated quotes and block comments are rejected here
//! 2. Statement kind: first token must be SELECT
//! 3. Single statement: no `;` outside literals
//! 4. Denylist: no forbidden keyword as a whole word, no locking clause
//! 5. Tenant scoping
//! 6. Limit bounding
//! 7. Marker translation to `?`
//! 8. Syntax sanity pass, then a full parse of the rewritten statement
//!
//! The separator check precedes the denylist so that a stacked statement is
//! reported as such even when its second half is also forbidden.

use crate::config::ConfigError;

use super::approved::{ApprovedQuery, Param, RawQueryRequest};
use super::errors::{ValidatorError, ValidatorResult};
use super::explain::RewriteExplanation;
use super::grammar::{Grammar, GrammarConfig};
use super::lexer::{self, depths, Token, TokenKind};
use super::limit::{self, LimitAction};
use super::sanity;
use super::scoping::{self, ScopeAction};
use super::sources;

/// Longest statement prefix echoed back in a statement-kind rejection
const FOUND_PREVIEW_CHARS: usize = 32;

/// Everything the rewrite produced, for explain output
#[derive(Debug)]
pub(crate) struct Rewrite {
    pub query: ApprovedQuery,
    pub scope: ScopeAction,
    pub limit: LimitAction,
    pub relations: Vec<String>,
}

/// Validates and rewrites untrusted SQL into an [`ApprovedQuery`]
#[derive(Debug, Clone)]
pub struct QueryValidator {
    config: GrammarConfig,
    grammar: Grammar,
}

impl QueryValidator {
    /// Build a validator for `config`.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` when the grammar is unusable: zero cap,
    /// malformed tenant marker, empty tenant column, or `select` on the
    /// denylist.
    pub fn new(config: GrammarConfig) -> Result<Self, ConfigError> {
        config.check().map_err(ConfigError::Invalid)?;
        Ok(Self::compiled(config))
    }

    fn compiled(config: GrammarConfig) -> Self {
        let grammar = Grammar::compile(&config);
        Self { config, grammar }
    }

    /// The grammar this validator was built from
    pub fn config(&self) -> &GrammarConfig {
        &self.config
    }

    /// Validate one statement for one tenant
    pub fn validate(&self, text: &str, tenant_id: &str) -> ValidatorResult<ApprovedQuery> {
        self.rewrite(text, tenant_id).map(|r| r.query)
    }

    /// [`validate`](Self::validate) for a deserialized request
    pub fn validate_request(&self, request: &RawQueryRequest) -> ValidatorResult<ApprovedQuery> {
        self.validate(&request.text, &request.tenant_id)
    }

    /// Validate and describe what was rewritten, or why it was rejected
    pub fn explain(&self, text: &str, tenant_id: &str) -> RewriteExplanation {
        match self.rewrite(text, tenant_id) {
            Ok(rewrite) => RewriteExplanation::accepted(&rewrite),
            Err(err) => RewriteExplanation::rejected(&err),
        }
    }

    pub(crate) fn rewrite(&self, text: &str, tenant_id: &str) -> ValidatorResult<Rewrite> {
        let mut tokens = self.normalize(text)?;

        let starts_with_select = tokens.first().is_some_and(|t| t.is_word("select"));
        if !starts_with_select {
            return Err(ValidatorError::RejectedStatementKind {
                found: tokens
                    .first()
                    .map(|t| t.text.chars().take(FOUND_PREVIEW_CHARS).collect()),
            });
        }

        if tokens.iter().any(|t| t.is_punct(';')) {
            return Err(ValidatorError::RejectedMultipleStatements);
        }

        if let Some(keyword) = self.find_forbidden(&tokens) {
            return Err(ValidatorError::RejectedForbiddenKeyword { keyword });
        }
        if let Some(keyword) = find_locking_clause(&tokens) {
            return Err(ValidatorError::RejectedForbiddenKeyword { keyword });
        }

        let scope = scoping::apply(&self.grammar, &mut tokens, tenant_id)?;
        let limit = limit::apply(&mut tokens, self.grammar.max_limit)?;
        let params = self.translate_markers(&mut tokens, tenant_id);
        sanity::check(&tokens)?;
        sources::parse(&tokens)?;

        Ok(Rewrite {
            query: ApprovedQuery::new(lexer::render(&tokens), params),
            scope: scope.action,
            limit,
            relations: scope.relations,
        })
    }

    fn normalize(&self, text: &str) -> ValidatorResult<Vec<Token>> {
        let mut tokens = lexer::tokenize(text)?;
        for token in tokens.iter_mut() {
            if token.kind == TokenKind::Word && self.grammar.is_canonical(&token.text) {
                token.text = token.text.to_ascii_uppercase();
            }
        }
        Ok(tokens)
    }

    fn find_forbidden(&self, tokens: &[Token]) -> Option<String> {
        tokens
            .iter()
            .filter_map(|t| t.ident_name())
            .find(|name| self.grammar.is_forbidden(name))
            .map(|name| name.to_ascii_lowercase())
    }

    /// Replace tenant markers with `?`, one tenant parameter per marker.
    /// Scoping has already rejected every other marker.
    fn translate_markers(&self, tokens: &mut [Token], tenant_id: &str) -> Vec<Param> {
        let mut params = Vec::new();
        for token in tokens.iter_mut() {
            match token.kind {
                TokenKind::NamedMarker if token.text == self.grammar.tenant_marker => {
                    token.kind = TokenKind::PositionalMarker;
                    token.text = "?".to_string();
                    params.push(Param::Tenant(tenant_id.to_string()));
                }
                TokenKind::PositionalMarker => {
                    params.push(Param::Tenant(tenant_id.to_string()));
                }
                _ => {}
            }
        }
        params
    }
}

/// Top-level `FOR <lock strength>`, reported as e.g. `for share`.
/// Row locks are not reads, whatever strength is asked for.
fn find_locking_clause(tokens: &[Token]) -> Option<String> {
    let depth = depths(tokens);
    let at = (0..tokens.len()).find(|&i| depth[i] == 0 && tokens[i].is_word("for"))?;
    Some(match tokens.get(at + 1).filter(|t| t.kind == TokenKind::Word) {
        Some(next) => format!("for {}", next.text.to_ascii_lowercase()),
        None => "for".to_string(),
    })
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::compiled(GrammarConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::errors::{LimitViolation, ScopeViolation, SyntaxViolation};

    fn validator() -> QueryValidator {
        QueryValidator::default()
    }

    fn tenant(id: &str) -> Vec<Param> {
        vec![Param::Tenant(id.to_string())]
    }

    #[test]
    fn test_order_by_scenario() {
        let approved = validator()
            .validate("select name, amount from entries order by date desc", "u42")
            .unwrap();
        assert_eq!(
            approved.sql(),
            "SELECT name, amount FROM entries WHERE user_id = ? ORDER BY date desc LIMIT 200"
        );
        assert_eq!(approved.params(), tenant("u42").as_slice());
    }

    #[test]
    fn test_already_scoped_gets_limit_only() {
        let approved = validator()
            .validate("SELECT * FROM categories WHERE userId = :userId", "u1")
            .unwrap();
        assert!(approved.sql().ends_with("LIMIT 200"));
        assert_eq!(approved.sql(), "SELECT * FROM categories WHERE userId = ? LIMIT 200");
        assert_eq!(approved.params(), tenant("u1").as_slice());
    }

    #[test]
    fn test_unscoped_relation_gets_no_params() {
        let approved = validator().validate("SELECT code FROM currencies", "u1").unwrap();
        assert_eq!(approved.sql(), "SELECT code FROM currencies LIMIT 200");
        assert!(approved.params().is_empty());
    }

    #[test]
    fn test_statement_kind() {
        let err = validator().validate("  delete from entries", "u1").unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedStatementKind {
                found: Some("delete".to_string())
            }
        );

        let err = validator().validate("   ", "u1").unwrap_err();
        assert_eq!(err, ValidatorError::RejectedStatementKind { found: None });
    }

    #[test]
    fn test_separator_reported_before_denylist() {
        let err = validator()
            .validate("SELECT * FROM entries; DROP TABLE entries", "u1")
            .unwrap_err();
        assert_eq!(err, ValidatorError::RejectedMultipleStatements);
    }

    #[test]
    fn test_separator_inside_literal_is_data() {
        let approved = validator()
            .validate("SELECT * FROM entries WHERE note = 'a; b'", "u1")
            .unwrap();
        assert!(approved.sql().contains("'a; b'"));
    }

    #[test]
    fn test_forbidden_keyword_whole_word_only() {
        let err = validator()
            .validate("SELECT * FROM entries WHERE id IN (SELECT 1) FOR UPDATE", "u1")
            .unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedForbiddenKeyword {
                keyword: "update".to_string()
            }
        );

        let approved = validator()
            .validate("SELECT updated_at, 'drop' AS label FROM currencies", "u1")
            .unwrap();
        assert!(approved.sql().contains("updated_at"));
    }

    #[test]
    fn test_forbidden_quoted_identifier() {
        let err = validator()
            .validate("SELECT \"Delete\" FROM currencies", "u1")
            .unwrap_err();
        assert_eq!(err.code(), crate::validator::ValidatorErrorCode::RejectedForbiddenKeyword);
    }

    #[test]
    fn test_select_into_is_forbidden() {
        let err = validator()
            .validate("SELECT * INTO backup FROM currencies", "u1")
            .unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedForbiddenKeyword {
                keyword: "into".to_string()
            }
        );
    }

    #[test]
    fn test_scope_runs_before_limit() {
        let err = validator()
            .validate("SELECT (SELECT 1 FROM entries) LIMIT 9999", "u1")
            .unwrap_err();
        assert!(matches!(
            err,
            ValidatorError::RejectedTenantScope(ScopeViolation::RelationInSubquery(_))
        ));
    }

    #[test]
    fn test_limit_above_cap_rejected() {
        let err = validator()
            .validate("SELECT * FROM entries LIMIT 1000", "u1")
            .unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedLimit(LimitViolation::Exceeded {
                requested: 1000,
                max: 200
            })
        );
    }

    #[test]
    fn test_sanity_runs_on_rewritten_text() {
        let err = validator()
            .validate("SELECT a,, b FROM entries", "u1")
            .unwrap_err();
        assert_eq!(err, ValidatorError::RejectedMalformedSyntax(SyntaxViolation::DoubledComma));
    }

    #[test]
    fn test_trailing_comment_cannot_swallow_limit() {
        let err = validator()
            .validate("SELECT * FROM currencies --", "u1")
            .unwrap_err();
        assert_eq!(err, ValidatorError::RejectedMalformedSyntax(SyntaxViolation::Comment));
    }

    #[test]
    fn test_tenant_id_is_never_spliced() {
        let approved = validator()
            .validate("SELECT * FROM entries", "x' OR '1'='1")
            .unwrap();
        assert!(!approved.sql().contains("OR '1'"));
        assert_eq!(approved.params(), tenant("x' OR '1'='1").as_slice());
    }

    #[test]
    fn test_custom_grammar() {
        let config = GrammarConfig::default()
            .with_tenant_relations(&["ledgers"])
            .with_tenant_column("owner_id", &[])
            .with_tenant_marker(":ownerId")
            .with_max_limit(25);
        let validator = QueryValidator::new(config).unwrap();

        let approved = validator.validate("SELECT * FROM ledgers", "o1").unwrap();
        assert_eq!(approved.sql(), "SELECT * FROM ledgers WHERE owner_id = ? LIMIT 25");

        let approved = validator.validate("SELECT * FROM entries", "o1").unwrap();
        assert_eq!(approved.sql(), "SELECT * FROM entries LIMIT 25");
    }

    #[test]
    fn test_invalid_grammar_refused_at_construction() {
        let err = QueryValidator::new(GrammarConfig::default().with_max_limit(0)).unwrap_err();
        assert_eq!(err.code(), "SQLGATE_CONFIG_INVALID");

        let err = QueryValidator::new(GrammarConfig::default().with_tenant_marker("")).unwrap_err();
        assert_eq!(err.code(), "SQLGATE_CONFIG_INVALID");

        let err = QueryValidator::new(GrammarConfig::default().with_tenant_column("  ", &[]))
            .unwrap_err();
        assert_eq!(err.code(), "SQLGATE_CONFIG_INVALID");
    }

    #[test]
    fn test_locking_clause_rejected() {
        let err = validator()
            .validate("SELECT * FROM entries WHERE a = 1 OR b = 2 FOR SHARE", "u1")
            .unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedForbiddenKeyword {
                keyword: "for share".to_string()
            }
        );

        let err = validator()
            .validate("SELECT * FROM currencies FOR KEY SHARE", "u1")
            .unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedForbiddenKeyword {
                keyword: "for key".to_string()
            }
        );
    }

    #[test]
    fn test_for_inside_function_call_is_not_a_lock() {
        let approved = validator()
            .validate("SELECT substring(code FROM 1 FOR 2) FROM currencies", "u1")
            .unwrap();
        assert_eq!(
            approved.sql(),
            "SELECT substring(code FROM 1 FOR 2) FROM currencies LIMIT 200"
        );
    }

    #[test]
    fn test_fetch_first_rejected() {
        let err = validator()
            .validate("SELECT * FROM entries FETCH FIRST 1000 ROWS ONLY", "u1")
            .unwrap_err();
        assert_eq!(err, ValidatorError::RejectedLimit(LimitViolation::Fetch));
    }

    #[test]
    fn test_unterminated_literal_rejected_at_lexing() {
        let err = validator()
            .validate("SELECT * FROM entries WHERE note = 'open", "u1")
            .unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedMalformedSyntax(SyntaxViolation::UnbalancedSingleQuotes)
        );
    }

    #[test]
    fn test_foreign_qualifier_rejected() {
        let err = validator()
            .validate(
                "SELECT e.* FROM entries e, (SELECT 'u1' AS user_id) x WHERE x.user_id = :userId",
                "u1",
            )
            .unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedTenantScope(ScopeViolation::ForeignQualifier("x".to_string()))
        );
    }

    #[test]
    fn test_joined_statement_scopes_tenant_relation() {
        let approved = validator()
            .validate(
                "select k.code, sum(e.amount) from entries e join currencies k on k.id = e.currency_id group by k.code",
                "u1",
            )
            .unwrap();
        assert_eq!(
            approved.sql(),
            "SELECT k.code, sum(e.amount) FROM entries e JOIN currencies k ON k.id = e.currency_id \
             WHERE e.user_id = ? GROUP BY k.code LIMIT 200"
        );
        assert_eq!(approved.params(), tenant("u1").as_slice());
    }
}
