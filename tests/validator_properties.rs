//! Validator property tests
//!
//! Properties checked over families of inputs rather than single cases:
//! 1. Statement kind: anything not starting with SELECT is rejected
//! 2. Denylist: whole-word matches only
//! 3. Idempotent scoping: approved output re-validates to itself
//! 4. Determinism: identical input, byte-identical output
//! 5. Bounding: every approved statement carries exactly one LIMIT <= cap
//! 6. Qualified scoping: a tenant predicate filters the tenant relation and
//!    no other source

use sqlgate::validator::{
    GrammarConfig, LimitViolation, Param, QueryValidator, ScopeViolation, ValidatorError,
    ValidatorErrorCode,
};

const ACCEPTED: &[&str] = &[
    "select name, amount from entries order by date desc",
    "SELECT * FROM categories WHERE userId = :userId",
    "SELECT * FROM entries WHERE amount > 10 OR note = 'x'",
    "SELECT e.name FROM entries e WHERE e.user_id = :userId AND e.amount BETWEEN 1 AND 5",
    "SELECT c.name, count(*) FROM categories c GROUP BY c.name HAVING count(*) > 1",
    "SELECT * FROM entries LIMIT 10",
    "SELECT code FROM currencies",
    "  SELECT   *\n\tFROM entries\n WHERE note = 'a;b -- c'",
    "SELECT k.code, sum(e.amount) FROM entries e JOIN currencies k ON k.id = e.currency_id GROUP BY k.code",
    "SELECT * FROM entries e LEFT JOIN currencies k ON k.id = e.currency_id WHERE e.user_id = ?",
    "SELECT * FROM entries ORDER BY id OFFSET 10",
];

fn validator() -> QueryValidator {
    QueryValidator::default()
}

fn limit_count(sql: &str) -> usize {
    sql.split_whitespace()
        .filter(|w| w.eq_ignore_ascii_case("limit"))
        .count()
}

// =============================================================================
// STATEMENT KIND
// =============================================================================

/// Any statement whose first token is not SELECT is rejected as a kind error.
#[test]
fn test_non_select_is_rejected() {
    let inputs = [
        "DELETE FROM entries",
        "  \n\t update entries set amount = 0",
        "insert into entries values (1)",
        "WITH x AS (SELECT 1) SELECT * FROM x",
        "(SELECT 1)",
        "EXPLAIN SELECT 1",
        "",
        "-- SELECT",
        "selectx FROM entries",
    ];

    for input in inputs {
        let err = validator().validate(input, "u1").unwrap_err();
        assert_eq!(
            err.code(),
            ValidatorErrorCode::RejectedStatementKind,
            "input: {:?}",
            input
        );
    }
}

/// SELECT is recognized regardless of case and leading whitespace.
#[test]
fn test_select_case_and_whitespace() {
    for input in ["select 1", "SeLeCt 1", "\n\n   SELECT 1"] {
        assert!(validator().validate(input, "u1").is_ok(), "input: {:?}", input);
    }
}

// =============================================================================
// DENYLIST
// =============================================================================

/// Every configured keyword is rejected as a whole word.
#[test]
fn test_every_forbidden_keyword_is_rejected() {
    let config = GrammarConfig::default();
    let validator = QueryValidator::new(config.clone()).unwrap();

    for keyword in &config.forbidden_keywords {
        let sql = format!("SELECT code FROM currencies WHERE {} = 1", keyword.to_uppercase());
        let err = validator.validate(&sql, "u1").unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedForbiddenKeyword {
                keyword: keyword.to_lowercase()
            },
            "sql: {}",
            sql
        );
    }
}

/// Keywords inside identifiers or string literals are not matches.
#[test]
fn test_denylist_is_whole_word_only() {
    let approved = validator()
        .validate(
            "SELECT * FROM entries WHERE 1=1 AND (SELECT count(*) FROM drop_log)",
            "u1",
        )
        .unwrap();
    assert!(approved.sql().contains("drop_log"));

    for sql in [
        "SELECT created_at, updated_by FROM currencies",
        "SELECT 'delete me' AS label FROM currencies",
        "SELECT inserts, dropped FROM currencies",
    ] {
        assert!(validator().validate(sql, "u1").is_ok(), "sql: {}", sql);
    }
}

/// A stacked statement is reported as such even when the tail is forbidden.
#[test]
fn test_stacked_statement() {
    let err = validator()
        .validate("SELECT * FROM entries; DROP TABLE entries", "u1")
        .unwrap_err();
    assert_eq!(err, ValidatorError::RejectedMultipleStatements);

    let err = validator().validate("SELECT 1;", "u1").unwrap_err();
    assert_eq!(err, ValidatorError::RejectedMultipleStatements);
}

// =============================================================================
// SCOPING
// =============================================================================

/// Re-validating an approved statement yields the same statement: exactly one
/// tenant predicate, never two.
#[test]
fn test_scoping_is_idempotent() {
    let validator = validator();

    for input in ACCEPTED {
        let first = validator.validate(input, "u7").unwrap();
        let second = validator.validate(first.sql(), "u7").unwrap();
        assert_eq!(first, second, "input: {:?}", input);
    }
}

/// A scoped statement binds the tenant exactly once.
#[test]
fn test_tenant_bound_once() {
    let approved = validator()
        .validate("SELECT * FROM entries WHERE user_id = :userId", "u1")
        .unwrap();
    assert_eq!(approved.sql().matches("user_id").count(), 1);
    assert_eq!(approved.params(), &[Param::Tenant("u1".to_string())]);
}

/// Tenant-owned relations that a single top-level predicate cannot cover are
/// rejected.
#[test]
fn test_unscopable_shapes_are_rejected() {
    let cases = [
        "SELECT * FROM currencies WHERE id IN (SELECT category_id FROM entries)",
        "SELECT name FROM categories UNION SELECT name FROM entries",
        "SELECT * FROM entries WHERE user_id = :userId OR 1 = 1",
        "SELECT * FROM entries WHERE user_id = :userId AND user_id = :userId",
        "SELECT * FROM entries WHERE amount = :amount",
    ];

    for sql in cases {
        let err = validator().validate(sql, "u1").unwrap_err();
        assert_eq!(
            err.code(),
            ValidatorErrorCode::RejectedTenantScope,
            "sql: {}",
            sql
        );
    }

    let err = validator().validate("SELECT * FROM entries", "").unwrap_err();
    assert_eq!(err, ValidatorError::RejectedTenantScope(ScopeViolation::EmptyTenant));
}

// =============================================================================
// QUALIFIED SCOPING
// =============================================================================

/// A qualified predicate must name the tenant relation or its alias; any
/// other qualifier leaves the tenant relation unfiltered.
#[test]
fn test_predicate_on_another_source_is_rejected() {
    let cases = [
        (
            "SELECT e.* FROM entries e, (SELECT 'u1' AS user_id) x WHERE x.user_id = :userId",
            "x",
        ),
        (
            "SELECT e.* FROM entries e JOIN currencies k ON k.id = e.currency_id WHERE k.user_id = ?",
            "k",
        ),
        ("SELECT * FROM entries WHERE nowhere.user_id = ?", "nowhere"),
    ];

    for (sql, qualifier) in cases {
        let err = validator().validate(sql, "u1").unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedTenantScope(ScopeViolation::ForeignQualifier(
                qualifier.to_string()
            )),
            "sql: {}",
            sql
        );
    }
}

/// One predicate scopes one relation, so two tenant relations in the outer
/// FROM clause are rejected, self-joins included.
#[test]
fn test_multiple_tenant_relations_are_rejected() {
    for sql in [
        "SELECT c.* FROM entries e CROSS JOIN categories c WHERE e.user_id = :userId",
        "SELECT * FROM entries, categories",
        "SELECT * FROM entries a JOIN entries b ON b.id = a.parent_id WHERE a.user_id = ?",
    ] {
        let err = validator().validate(sql, "u1").unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedTenantScope(ScopeViolation::MultipleTenantRelations),
            "sql: {}",
            sql
        );
    }
}

/// With several sources an unqualified predicate could resolve to another
/// source's column, so it is rejected; an injected one is qualified.
#[test]
fn test_several_sources_need_qualified_predicate() {
    let err = validator()
        .validate(
            "SELECT e.* FROM entries e, (SELECT 'u1' AS user_id) x WHERE user_id = :userId",
            "u1",
        )
        .unwrap_err();
    assert_eq!(
        err,
        ValidatorError::RejectedTenantScope(ScopeViolation::UnqualifiedPredicate)
    );

    let approved = validator()
        .validate("SELECT * FROM entries e, currencies k WHERE k.id = e.currency_id", "u1")
        .unwrap();
    assert_eq!(
        approved.sql(),
        "SELECT * FROM entries e, currencies k WHERE e.user_id = ? AND k.id = e.currency_id LIMIT 200"
    );
}

// =============================================================================
// ROW BOUNDS AND LOCKS
// =============================================================================

/// FETCH FIRST is not a second way around the cap.
#[test]
fn test_fetch_first_is_rejected() {
    for sql in [
        "SELECT * FROM entries FETCH FIRST 1000 ROWS ONLY",
        "SELECT * FROM currencies OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY",
    ] {
        let err = validator().validate(sql, "u1").unwrap_err();
        assert_eq!(
            err,
            ValidatorError::RejectedLimit(LimitViolation::Fetch),
            "sql: {}",
            sql
        );
    }
}

/// Row-locking clauses are rejected whatever their strength.
#[test]
fn test_locking_clauses_are_rejected() {
    for sql in [
        "SELECT * FROM entries WHERE a = 1 OR b = 2 FOR SHARE",
        "SELECT * FROM currencies FOR KEY SHARE",
        "SELECT * FROM currencies FOR NO KEY UPDATE",
        "SELECT * FROM currencies LIMIT 5 FOR SHARE",
    ] {
        let err = validator().validate(sql, "u1").unwrap_err();
        assert_eq!(
            err.code(),
            ValidatorErrorCode::RejectedForbiddenKeyword,
            "sql: {}",
            sql
        );
    }
}

/// An appended LIMIT stays in front of OFFSET.
#[test]
fn test_limit_precedes_offset() {
    let approved = validator()
        .validate("SELECT code FROM currencies ORDER BY code OFFSET 20", "u1")
        .unwrap();
    assert_eq!(
        approved.sql(),
        "SELECT code FROM currencies ORDER BY code LIMIT 200 OFFSET 20"
    );
}

// =============================================================================
// DETERMINISM AND BOUNDING
// =============================================================================

/// Identical input gives byte-identical output, across validator instances.
#[test]
fn test_determinism() {
    for input in ACCEPTED {
        let a = validator().validate(input, "tenant-1").unwrap();
        let b = validator().validate(input, "tenant-1").unwrap();
        assert_eq!(a.sql().as_bytes(), b.sql().as_bytes());
        assert_eq!(a.params(), b.params());
    }
}

/// Every approved statement ends with exactly one LIMIT within the cap.
#[test]
fn test_every_approved_statement_is_bounded() {
    let validator = validator();
    for input in ACCEPTED {
        let approved = validator.validate(input, "u1").unwrap();
        assert_eq!(limit_count(approved.sql()), 1, "sql: {}", approved.sql());

        let words: Vec<&str> = approved.sql().split_whitespace().collect();
        let at = words
            .iter()
            .position(|w| w.eq_ignore_ascii_case("limit"))
            .unwrap();
        let bound: u64 = words[at + 1].parse().unwrap();
        assert!(bound <= 200, "sql: {}", approved.sql());
    }
}

/// Limits above the cap are rejected rather than clamped.
#[test]
fn test_limit_above_cap_is_rejected() {
    for limit in [201u64, 1000, u32::MAX as u64] {
        let sql = format!("SELECT * FROM entries LIMIT {}", limit);
        let err = validator().validate(&sql, "u1").unwrap_err();
        assert_eq!(err.code(), ValidatorErrorCode::RejectedLimit, "sql: {}", sql);
    }
}

/// The reference scenario, end to end.
#[test]
fn test_reference_scenario() {
    let approved = validator()
        .validate("select name, amount from entries order by date desc", "u42")
        .unwrap();
    assert_eq!(
        approved.sql(),
        "SELECT name, amount FROM entries WHERE user_id = ? ORDER BY date desc LIMIT 200"
    );
    assert_eq!(approved.params(), &[Param::Tenant("u42".to_string())]);
}
