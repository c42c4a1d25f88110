//! Limit bounding
//!
//! The approved statement carries exactly one outer `LIMIT` with an integer
//! literal bound no larger than the cap. A missing limit is appended; a
//! larger one is rejected, never widened or clamped.
//!
//! An appended limit goes in front of a top-level `OFFSET` or locking
//! clause so the statement stays in clause order. `FETCH FIRST` is refused
//! outright: one statement cannot carry both row-bounding forms.

use super::errors::{LimitViolation, ValidatorError, ValidatorResult};
use super::lexer::{depths, Token, TokenKind};

/// What the bounding step did to the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitAction {
    /// `LIMIT <max>` was appended
    Appended(u64),
    /// The caller's limit was within the cap and kept
    Kept(u64),
}

impl LimitAction {
    /// Row bound the approved statement carries
    pub fn bound(&self) -> u64 {
        match self {
            LimitAction::Appended(n) | LimitAction::Kept(n) => *n,
        }
    }
}

/// Top-level words an appended `LIMIT` goes in front of
const AFTER_LIMIT: &[&str] = &["offset", "for"];

/// Bound `tokens` by `max_limit` rows
pub(crate) fn apply(tokens: &mut Vec<Token>, max_limit: u64) -> ValidatorResult<LimitAction> {
    if tokens.iter().any(|t| t.is_word("fetch")) {
        return Err(ValidatorError::limit(LimitViolation::Fetch));
    }

    let depth = depths(tokens);
    let limits: Vec<usize> = (0..tokens.len())
        .filter(|&i| tokens[i].is_word("limit"))
        .collect();

    match limits.as_slice() {
        [] => {
            let at = (0..tokens.len())
                .find(|&i| depth[i] == 0 && AFTER_LIMIT.iter().any(|w| tokens[i].is_word(w)))
                .unwrap_or(tokens.len());
            let bound = Token::new(TokenKind::Number, max_limit.to_string(), true);
            tokens.splice(at..at, [Token::word("LIMIT"), bound]);
            Ok(LimitAction::Appended(max_limit))
        }
        [at] => {
            if depth[*at] != 0 {
                return Err(ValidatorError::limit(LimitViolation::Nested));
            }
            let bound = literal_bound(tokens, *at)
                .ok_or(ValidatorError::limit(LimitViolation::NotLiteral))?;
            if bound > max_limit {
                return Err(ValidatorError::limit(LimitViolation::Exceeded {
                    requested: bound,
                    max: max_limit,
                }));
            }
            Ok(LimitAction::Kept(bound))
        }
        many => {
            if many.iter().any(|&i| depth[i] != 0) {
                Err(ValidatorError::limit(LimitViolation::Nested))
            } else {
                Err(ValidatorError::limit(LimitViolation::Multiple))
            }
        }
    }
}

/// Integer literal directly after `LIMIT`, standing alone
fn literal_bound(tokens: &[Token], limit_idx: usize) -> Option<u64> {
    let bound = tokens.get(limit_idx + 1)?;
    if bound.kind != TokenKind::Number {
        return None;
    }
    let standalone = tokens
        .get(limit_idx + 2)
        .map_or(true, |next| next.kind == TokenKind::Word);
    if !standalone {
        return None;
    }
    bound.text.parse::<u64>().ok()
}
