//! SQL tokenizer
//!
//! Lexes a statement once with the PostgreSQL dialect of `sqlparser` and
//! flattens the result into the token sequence every later check runs over,
//! so string literal content and identifier substrings never match a rule.
//!
//! Each token keeps its exact source text, sliced by span. Rendering never
//! re-quotes or re-escapes anything. Whitespace is folded into
//! `space_before`; comments are kept as tokens and rejected by the sanity
//! pass.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{
    Location, Token as SqlToken, TokenWithSpan, Tokenizer, TokenizerError, Whitespace,
};

use super::errors::{SyntaxViolation, ValidatorError, ValidatorResult};

/// Characters a comparison operator is made of
const COMPARISON_CHARS: &str = "=<>!";

/// Characters accepted as punctuation or arithmetic
const PUNCT_CHARS: &str = "(),.;:*+-/%|&^~[]";

/// Token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: keyword or unquoted identifier
    Word,
    /// Double-quoted identifier
    QuotedIdent,
    /// String literal of any quoting style (`'..'`, `E'..'`, `$$..$$`)
    StringLiteral,
    /// Numeric literal
    Number,
    /// Named parameter marker such as `:userId`
    NamedMarker,
    /// Positional parameter marker: `?` or `$n`
    PositionalMarker,
    /// Run of comparison characters (`=`, `<`, `>`, `!`)
    Comparison,
    /// Type cast `::`
    Cast,
    /// Punctuation or arithmetic operator
    Punct,
    /// `--` line comment or `/* */` block comment
    Comment,
    /// Character outside the accepted grammar
    Unknown,
}

/// A lexed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text, quotes included
    pub text: String,
    /// Whether whitespace preceded this token in the source
    pub space_before: bool,
}

impl Token {
    /// Create a token from its kind and source text
    pub fn new(kind: TokenKind, text: impl Into<String>, space_before: bool) -> Self {
        Self {
            kind,
            text: text.into(),
            space_before,
        }
    }

    /// Bare word token rendered with a leading space
    pub fn word(text: &str) -> Self {
        Self::new(TokenKind::Word, text, true)
    }

    /// Case-insensitive keyword test (bare words only)
    pub fn is_word(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Single punctuation character test
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text.len() == 1 && self.text.starts_with(c)
    }

    /// Named or positional parameter marker
    pub fn is_marker(&self) -> bool {
        matches!(self.kind, TokenKind::NamedMarker | TokenKind::PositionalMarker)
    }

    /// Identifier name with quoting removed, for bare words and quoted
    /// identifiers
    pub fn ident_name(&self) -> Option<String> {
        match self.kind {
            TokenKind::Word => Some(self.text.clone()),
            TokenKind::QuotedIdent => Some(unquote(&self.text)),
            _ => None,
        }
    }

    /// Identifier name as the engine resolves it: bare words fold to lower
    /// case, quoted identifiers keep their exact spelling
    pub fn folded_name(&self) -> Option<String> {
        match self.kind {
            TokenKind::Word => Some(self.text.to_lowercase()),
            TokenKind::QuotedIdent => Some(unquote(&self.text)),
            _ => None,
        }
    }
}

/// Lex `input` into tokens.
///
/// Unterminated quotes and comments are rejected here, since the tokenizer
/// cannot produce a token for them.
pub fn tokenize(input: &str) -> ValidatorResult<Vec<Token>> {
    let dialect = PostgreSqlDialect {};
    let raw = Tokenizer::new(&dialect, input)
        .tokenize_with_location()
        .map_err(lex_error)?;

    let source = SourceMap::new(input);
    let mut tokens: Vec<Token> = Vec::with_capacity(raw.len());
    let mut space = false;
    let mut i = 0;

    while i < raw.len() {
        let item = &raw[i];
        i += 1;

        let (kind, text) = match &item.token {
            SqlToken::Whitespace(Whitespace::SingleLineComment { .. })
            | SqlToken::Whitespace(Whitespace::MultiLineComment(_)) => {
                (TokenKind::Comment, source.slice(item))
            }
            SqlToken::Whitespace(_) => {
                space = true;
                continue;
            }
            SqlToken::EOF => continue,
            // `:name` arrives as a colon followed by a bare word
            SqlToken::Colon if raw.get(i).is_some_and(|next| is_bare_word(&next.token)) => {
                let name = source.slice(&raw[i]);
                i += 1;
                (TokenKind::NamedMarker, format!(":{}", name))
            }
            token => {
                let text = source.slice(item);
                (classify(token, &text), text)
            }
        };

        let extends_run = kind == TokenKind::Comparison
            && !space
            && tokens
                .last()
                .is_some_and(|last| last.kind == TokenKind::Comparison);
        if extends_run {
            if let Some(last) = tokens.last_mut() {
                last.text.push_str(&text);
            }
        } else {
            tokens.push(Token::new(kind, text, space));
        }
        space = false;
    }

    Ok(tokens)
}

/// Render tokens back to text, one space wherever the source had whitespace
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && token.space_before {
            out.push(' ');
        }
        out.push_str(&token.text);
    }
    out
}

/// Parenthesis depth of each token.
///
/// A parenthesis sits at the depth of the expression that contains it.
/// Depth may go negative on unbalanced input; the sanity pass rejects that.
pub fn depths(tokens: &[Token]) -> Vec<i32> {
    let mut depth = 0;
    tokens
        .iter()
        .map(|t| {
            if t.is_punct('(') {
                depth += 1;
                depth - 1
            } else if t.is_punct(')') {
                depth -= 1;
                depth
            } else {
                depth
            }
        })
        .collect()
}

fn classify(token: &SqlToken, text: &str) -> TokenKind {
    match token {
        SqlToken::Word(word) if word.quote_style.is_some() => TokenKind::QuotedIdent,
        SqlToken::Word(_) => TokenKind::Word,
        SqlToken::Number(..) => TokenKind::Number,
        SqlToken::SingleQuotedString(_)
        | SqlToken::EscapedStringLiteral(_)
        | SqlToken::NationalStringLiteral(_)
        | SqlToken::HexStringLiteral(_)
        | SqlToken::DollarQuotedString(_) => TokenKind::StringLiteral,
        SqlToken::Placeholder(p) if p.starts_with(':') => TokenKind::NamedMarker,
        SqlToken::Placeholder(_) => TokenKind::PositionalMarker,
        SqlToken::DoubleColon => TokenKind::Cast,
        SqlToken::Char(_) => TokenKind::Unknown,
        // `?` is an operator token in the PostgreSQL dialect
        _ if text == "?" => TokenKind::PositionalMarker,
        _ if is_made_of(text, COMPARISON_CHARS) => TokenKind::Comparison,
        _ if is_made_of(text, PUNCT_CHARS) => TokenKind::Punct,
        _ => TokenKind::Unknown,
    }
}

fn is_bare_word(token: &SqlToken) -> bool {
    matches!(token, SqlToken::Word(word) if word.quote_style.is_none())
}

fn is_made_of(text: &str, chars: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| chars.contains(c))
}

/// Strip surrounding double quotes and undo doubled inner quotes
fn unquote(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    inner.replace("\"\"", "\"")
}

fn lex_error(err: TokenizerError) -> ValidatorError {
    let message = err.message;
    let violation = if message.contains("string literal") {
        SyntaxViolation::UnbalancedSingleQuotes
    } else if message.contains('"') {
        SyntaxViolation::UnbalancedDoubleQuotes
    } else if message.contains("comment") {
        SyntaxViolation::Comment
    } else {
        SyntaxViolation::Unparseable(message)
    };
    ValidatorError::syntax(violation)
}

/// Maps tokenizer locations (1-based line and column, in characters) back
/// to source text
struct SourceMap {
    chars: Vec<char>,
    line_starts: Vec<usize>,
}

impl SourceMap {
    fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let mut line_starts = vec![0];
        for (i, c) in chars.iter().enumerate() {
            if *c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self { chars, line_starts }
    }

    fn offset(&self, location: &Location) -> usize {
        let line = (location.line as usize).saturating_sub(1);
        let start = self
            .line_starts
            .get(line)
            .copied()
            .unwrap_or(self.chars.len());
        (start + (location.column as usize).saturating_sub(1)).min(self.chars.len())
    }

    fn slice(&self, item: &TokenWithSpan) -> String {
        let start = self.offset(&item.span.start);
        let end = self.offset(&item.span.end).max(start);
        if start == end {
            return item.token.to_string();
        }
        self.chars[start..end].iter().collect()
    }
}
