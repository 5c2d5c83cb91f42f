//! Parsed forms of pipeline stages.

use std::fmt;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Status used for failures detected by the interpreter itself.
pub const FAILURE: ExitCode = 1;

/// Status of an input rejected by the parser.
pub const SYNTAX_ERROR: ExitCode = 2;

/// Kind of redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `< file`
    Input,
    /// `> file`
    Output,
    /// `>> file`
    OutputAppend,
    /// `<< DELIM`
    Heredoc,
}

impl RedirectKind {
    /// Recognize a redirection operator token.
    pub fn from_operator(token: &str) -> Option<Self> {
        match token {
            "<" => Some(RedirectKind::Input),
            "<<" => Some(RedirectKind::Heredoc),
            ">" => Some(RedirectKind::Output),
            ">>" => Some(RedirectKind::OutputAppend),
            _ => None,
        }
    }

    pub fn as_operator(self) -> &'static str {
        match self {
            RedirectKind::Input => "<",
            RedirectKind::Heredoc => "<<",
            RedirectKind::Output => ">",
            RedirectKind::OutputAppend => ">>",
        }
    }
}

/// One redirection of a command: a file name, or the delimiter for heredocs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub kind: RedirectKind,
    pub target: String,
}

/// A single pipeline stage after word splitting and expansion.
///
/// `args[0]` is always `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
    pub redirections: Vec<Redirection>,
    pub background: bool,
}

impl Command {
    /// Arguments after the command name.
    pub fn operands(&self) -> &[String] {
        &self.args[1..]
    }
}

/// Renders the command back into segment syntax. Words that would not read
/// back as themselves are written quoted.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arg in &self.args {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write_word(f, arg)?;
        }
        for redirection in &self.redirections {
            write!(f, " {} ", redirection.kind.as_operator())?;
            write_word(f, &redirection.target)?;
        }
        if self.background {
            f.write_str(" &")?;
        }
        Ok(())
    }
}

fn write_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
    let needs_quotes = word.is_empty()
        || word.contains(|c: char| c.is_whitespace() || c == '$')
        || word.starts_with(['{', '"'])
        || matches!(
            word,
            "&&" | "||" | ";" | "=" | "|" | "&" | "<" | "<<" | ">" | ">>"
        );
    if needs_quotes {
        write!(f, "\"{word}\"")
    } else {
        f.write_str(word)
    }
}

/// Pipe-connected commands. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub commands: Vec<Command>,
    /// Detach the whole pipeline instead of waiting for it.
    pub background: bool,
}
