//! Recursive-descent parsing of the interpreter grammar:
//!
//! ```text
//! expr       := stmt | stmt op expr
//! stmt       := '{' expr '}' | invocation
//! invocation := command ('|' command)*
//! command    := WORD arg* ['&'] (redir WORD)*
//! op         := '&&' | '||' | ';' | '='
//! redir      := '<' | '<<' | '>' | '>>'
//! arg        := '"' ... '"' | $NAME | LITERAL
//! ```
//!
//! Expressions are not turned into a tree up front. [`parse_expr`] peels off the
//! leftmost statement and hands back the remaining text, and the evaluator
//! recurses on it. All levels work on the tokens produced by [`crate::lexer`].

use crate::command::{Command, Invocation, RedirectKind, Redirection};
use crate::env::Environment;
use crate::error::ParseError;
use crate::expand::expand_word;
use crate::lexer::{self, Operator, Token, TokenKind};

/// One step of expression parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expr<'a> {
    /// Whitespace only; evaluates to success.
    Empty,
    /// A lone statement without a top-level operator.
    Statement(&'a str),
    /// `left op right`, where `right` is a whole expression still to be parsed.
    Binary {
        left: &'a str,
        op: Operator,
        right: &'a str,
    },
}

/// A statement is either a braced sub-expression or a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement<'a> {
    /// The text between the outer braces.
    Braced(&'a str),
    /// Text to be parsed by [`parse_invocation`].
    Invocation(&'a str),
}

/// Split an expression at its leftmost top-level operator.
pub fn parse_expr(text: &str) -> Result<Expr<'_>, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Expr::Empty);
    }

    let tokens = lexer::tokenize(text)?;
    let found = tokens.iter().enumerate().find_map(|(idx, tok)| match tok.kind {
        TokenKind::Operator(op) => Some((idx, op, tok)),
        _ => None,
    });

    let Some((idx, op, tok)) = found else {
        return Ok(Expr::Statement(text));
    };
    if idx == 0 {
        return Err(ParseError::EmptyLeftOperand(op.as_str().to_string()));
    }
    if idx == tokens.len() - 1 {
        return Err(ParseError::MissingRightOperand(op.as_str().to_string()));
    }

    let left = text[..tok.span.start].trim();
    let right = text[tok.span.end..].trim();
    log::debug!("split {left:?} {} {right:?}", op.as_str());
    Ok(Expr::Binary { left, op, right })
}

/// Classify a statement.
///
/// The text must already be free of top-level operators; [`parse_expr`] guarantees it.
pub fn parse_statement(text: &str) -> Result<Statement<'_>, ParseError> {
    let text = text.trim();
    if text.starts_with('{') && lexer::match_brace(text, 0)? == text.len() - 1 {
        Ok(Statement::Braced(&text[1..text.len() - 1]))
    } else {
        Ok(Statement::Invocation(text))
    }
}

/// Split an invocation into the raw text of its pipe segments.
pub fn split_pipeline(text: &str) -> Result<Vec<&str>, ParseError> {
    let text = text.trim();
    let tokens = lexer::tokenize(text)?;
    let mut segments = Vec::new();
    let mut segment_start = 0;

    for tok in tokens.iter().filter(|t| t.kind == TokenKind::Pipe) {
        let segment = text[segment_start..tok.span.start].trim();
        if segment.is_empty() {
            return Err(ParseError::EmptyPipeSegment);
        }
        segments.push(segment);
        segment_start = tok.span.end;
    }

    let last = text[segment_start..].trim();
    if last.is_empty() && !segments.is_empty() {
        return Err(ParseError::EmptyPipeSegment);
    }
    segments.push(last);
    Ok(segments)
}

/// Parse an invocation into expanded commands.
///
/// A trailing `&` on any segment detaches the whole pipeline.
pub fn parse_invocation(text: &str, env: &Environment) -> Result<Invocation, ParseError> {
    let commands = split_pipeline(text)?
        .into_iter()
        .map(|segment| parse_command(segment, env))
        .collect::<Result<Vec<_>, _>>()?;
    let background = commands.iter().any(|c| c.background);
    Ok(Invocation {
        commands,
        background,
    })
}

/// Parse one pipe segment into a [`Command`].
pub fn parse_command(text: &str, env: &Environment) -> Result<Command, ParseError> {
    let tokens = lexer::tokenize(text.trim())?;
    SegmentBuilder::new(tokens, env).build()
}

struct SegmentBuilder<'a, 'e> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    env: &'e Environment,
}

impl<'a, 'e> SegmentBuilder<'a, 'e> {
    fn new(tokens: Vec<Token<'a>>, env: &'e Environment) -> Self {
        Self {
            tokens,
            pos: 0,
            env,
        }
    }

    fn consume(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn build(mut self) -> Result<Command, ParseError> {
        let mut args = Vec::new();
        let mut redirections = Vec::new();
        let mut background = false;

        while let Some(token) = self.consume() {
            match token.kind {
                TokenKind::Background if self.only_redirections_left() => background = true,
                TokenKind::Redirect(kind) => {
                    let target = match self.consume() {
                        Some(t) if is_word(&t) => t,
                        _ => {
                            return Err(ParseError::MissingRedirectTarget(
                                kind.as_operator().to_string(),
                            ));
                        }
                    };
                    let target = match kind {
                        RedirectKind::Heredoc => target.text.to_string(),
                        _ => self.word_value(&target),
                    };
                    redirections.push(Redirection { kind, target });
                }
                _ => args.push(self.word_value(&token)),
            }
        }

        let name = args.first().cloned().ok_or(ParseError::MissingCommandName)?;
        Ok(Command {
            name,
            args,
            redirections,
            background,
        })
    }

    /// `&` marks the segment as background only in the `['&'] (redir WORD)*`
    /// tail; anywhere else it is an ordinary word.
    fn only_redirections_left(&self) -> bool {
        self.tokens[self.pos..]
            .iter()
            .step_by(2)
            .all(|t| matches!(t.kind, TokenKind::Redirect(_)))
    }

    /// Quoted words are taken verbatim, everything else is expanded.
    fn word_value(&self, token: &Token<'_>) -> String {
        match token.kind {
            TokenKind::Quoted => token.text.to_string(),
            _ => expand_word(token.text, self.env),
        }
    }
}

fn is_word(token: &Token<'_>) -> bool {
    matches!(
        token.kind,
        TokenKind::Word | TokenKind::Quoted | TokenKind::Group
    )
}
