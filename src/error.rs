//! Error taxonomy of the interpreter.
//!
//! None of these errors is fatal to the interpreter process. A [`ParseError`]
//! aborts the top-level input it occurred in; every other [`ShellError`] is
//! reported where it happens and turned into a failed exit status.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Syntax errors found while splitting an input into expressions, statements,
/// pipe segments and words.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A `{` without a matching `}`.
    #[error("parse error: failed to match brace opened at offset {0}")]
    UnbalancedBrace(usize),
    /// A `"` without a closing `"`.
    #[error("parse error: unterminated quote opened at offset {0}")]
    UnterminatedQuote(usize),
    /// An operator in the first position of an expression.
    #[error("parse error: left statement of '{0}' is empty")]
    EmptyLeftOperand(String),
    /// An operator in the last position of an expression.
    #[error("parse error: expected expression after operator '{0}'")]
    MissingRightOperand(String),
    /// A `|` with no command on one of its sides.
    #[error("parse error: empty command around '|'")]
    EmptyPipeSegment,
    /// A pipe segment that has redirections or `&` but no command word.
    #[error("parse error: missing command name")]
    MissingCommandName,
    /// A redirection operator at the end of a segment.
    #[error("parse error: expected file name after '{0}'")]
    MissingRedirectTarget(String),
}

/// Any failure while evaluating an input.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Command name did not resolve to an executable.
    #[error("{0}: not a valid command")]
    Resolution(String),

    /// A redirection target could not be opened.
    #[error("cannot open file '{}': {source}", path.display())]
    Redirection {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed assignment or built-in usage.
    #[error("{0}")]
    Validation(String),

    /// The OS refused to create a process.
    #[error("failed to spawn '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}
