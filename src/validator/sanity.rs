//! Syntax sanity pass over the fully rewritten statement
//!
//! Any violation is a rejection; nothing is repaired. Quote balance is
//! settled earlier by the tokenizer. Scoping also runs these checks to name
//! the specific fault when a statement does not parse.

use super::errors::{SyntaxViolation, ValidatorError, ValidatorResult};
use super::lexer::{Token, TokenKind};

/// Clause keywords that are never legitimately repeated back to back
const NON_REPEATING: &[&str] = &[
    "select", "from", "where", "and", "or", "group", "order", "by", "having", "limit", "offset",
    "join", "on", "as",
];

/// Keywords that need an operand after them
const NEEDS_OPERAND: &[&str] = &["where", "and", "or", "on", "having"];

const COMPARISON_OPERATORS: &[&str] = &["=", "<", ">", "<=", ">=", "<>", "!="];

/// Run every check in order; the first violation is returned
pub(crate) fn check(tokens: &[Token]) -> ValidatorResult<()> {
    check_parentheses(tokens)?;
    check_adjacent_pairs(tokens)?;
    check_operators(tokens)?;
    check_dangling_keywords(tokens)?;
    check_foreign_tokens(tokens)?;
    Ok(())
}

fn reject(violation: SyntaxViolation) -> ValidatorResult<()> {
    Err(ValidatorError::syntax(violation))
}

fn check_parentheses(tokens: &[Token]) -> ValidatorResult<()> {
    let mut depth: i64 = 0;
    for token in tokens {
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth -= 1;
            if depth < 0 {
                return reject(SyntaxViolation::UnbalancedParentheses);
            }
        }
    }
    if depth != 0 {
        return reject(SyntaxViolation::UnbalancedParentheses);
    }
    Ok(())
}

fn check_adjacent_pairs(tokens: &[Token]) -> ValidatorResult<()> {
    for pair in tokens.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.is_punct(',') && b.is_punct(',') {
            return reject(SyntaxViolation::DoubledComma);
        }
        let repeated = NON_REPEATING
            .iter()
            .find(|kw| a.is_word(kw) && b.is_word(kw));
        if let Some(kw) = repeated {
            return reject(SyntaxViolation::DuplicateKeyword(kw.to_string()));
        }
    }
    Ok(())
}

fn check_operators(tokens: &[Token]) -> ValidatorResult<()> {
    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Comparison {
            continue;
        }
        if !COMPARISON_OPERATORS.contains(&token.text.as_str()) {
            return reject(SyntaxViolation::MalformedOperator(token.text.clone()));
        }
        if let Some(next) = tokens.get(i + 1) {
            if next.kind == TokenKind::Comparison {
                return reject(SyntaxViolation::MalformedOperator(format!(
                    "{} {}",
                    token.text, next.text
                )));
            }
        }
    }
    Ok(())
}

fn check_dangling_keywords(tokens: &[Token]) -> ValidatorResult<()> {
    for (i, token) in tokens.iter().enumerate() {
        let Some(kw) = NEEDS_OPERAND.iter().find(|kw| token.is_word(kw)) else {
            continue;
        };
        let dangling = match tokens.get(i + 1) {
            None => true,
            Some(next) => next.is_punct(')') || next.is_punct(','),
        };
        if dangling {
            return reject(SyntaxViolation::EmptyClause(kw.to_string()));
        }
    }
    Ok(())
}

fn check_foreign_tokens(tokens: &[Token]) -> ValidatorResult<()> {
    for token in tokens {
        match token.kind {
            TokenKind::Comment => return reject(SyntaxViolation::Comment),
            TokenKind::Unknown => {
                return reject(SyntaxViolation::UnexpectedCharacter(token.text.clone()))
            }
            _ => {}
        }
    }
    Ok(())
}
