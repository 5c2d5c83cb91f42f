//! Lexical analysis shared by every grammar level.
//!
//! The input is split into whitespace-delimited tokens. A token starting with
//! `{` extends to its matching `}` and a token starting with `"` extends to the
//! next `"`, so operators inside braces or quotes never show up as operator
//! tokens. Operators are recognized by exact token match only: `a&&b` is one word,
//! and so is text glued to a closing `}` or `"`, as in `{a}&&`.

use crate::command::RedirectKind;
use crate::error::ParseError;
use std::ops::Range;

/// Statement connectives, in the order they are listed by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `;`
    Sequence,
    /// `=`
    Assign,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Sequence => ";",
            Operator::Assign => "=",
        }
    }
}

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Unquoted text, subject to variable expansion.
    Word,
    /// `"..."`; the token text is the content between the quotes.
    Quoted,
    /// `{...}`; the token text includes both braces.
    Group,
    /// One of `&&`, `||`, `;`, `=`.
    Operator(Operator),
    /// `|`
    Pipe,
    /// One of `<`, `<<`, `>`, `>>`.
    Redirect(RedirectKind),
    /// `&`
    Background,
}

/// A token borrowing from the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte range of the whole token in the scanned text, delimiters included.
    pub span: Range<usize>,
}

/// Find the `}` matching the `{` at `open`.
///
/// Braces nest by depth counting. Returns the byte offset of the closing brace.
pub fn match_brace(text: &str, open: usize) -> Result<usize, ParseError> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return Err(ParseError::UnbalancedBrace(open));
    }
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(ParseError::UnbalancedBrace(open))
}

/// Find the `"` closing the quote opened at `open`. Quotes do not nest and
/// there are no escape sequences.
pub fn match_quote(text: &str, open: usize) -> Result<usize, ParseError> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'"') {
        return Err(ParseError::UnterminatedQuote(open));
    }
    bytes[open + 1..]
        .iter()
        .position(|&b| b == b'"')
        .map(|rel| open + 1 + rel)
        .ok_or(ParseError::UnterminatedQuote(open))
}

/// Split `text` into typed tokens.
pub fn tokenize(text: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;
        let token = match bytes[pos] {
            b'{' => {
                pos = match_brace(text, start)? + 1;
                Token {
                    kind: TokenKind::Group,
                    text: &text[start..pos],
                    span: start..pos,
                }
            }
            b'"' => {
                let close = match_quote(text, start)?;
                pos = close + 1;
                Token {
                    kind: TokenKind::Quoted,
                    text: &text[start + 1..close],
                    span: start..pos,
                }
            }
            _ => {
                while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
                let word = &text[start..pos];
                // Operators must be whitespace-delimited, so `{a}&&` is not one.
                let glued = tokens.last().is_some_and(|prev: &Token<'_>| {
                    prev.span.end == start
                        && matches!(prev.kind, TokenKind::Group | TokenKind::Quoted)
                });
                Token {
                    kind: if glued { TokenKind::Word } else { classify(word) },
                    text: word,
                    span: start..pos,
                }
            }
        };
        log::trace!("token {:?} {:?}", token.kind, token.text);
        tokens.push(token);
    }

    Ok(tokens)
}

fn classify(word: &str) -> TokenKind {
    match word {
        "&&" => TokenKind::Operator(Operator::And),
        "||" => TokenKind::Operator(Operator::Or),
        ";" => TokenKind::Operator(Operator::Sequence),
        "=" => TokenKind::Operator(Operator::Assign),
        "|" => TokenKind::Pipe,
        "&" => TokenKind::Background,
        _ => match RedirectKind::from_operator(word) {
            Some(kind) => TokenKind::Redirect(kind),
            None => TokenKind::Word,
        },
    }
}
