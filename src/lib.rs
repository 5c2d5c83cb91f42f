//! A small interactive command interpreter.
//!
//! Input lines are expressions built from statements joined by `&&`, `||`,
//! `;` and `=`. A statement is either a braced sub-expression or a pipeline of
//! external programs with quoting, `$NAME` expansion, file redirections,
//! heredocs and background execution. `cd` and `exit` run inside the
//! interpreter itself.
//!
//! The main entry point is [`Interpreter`]. The [`parser`] module exposes each
//! grammar level on its own, and [`pipeline`] separates planning a pipeline
//! from launching it so process creation can be replaced.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
mod expand;
pub mod external;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod repl;

pub use env::Environment;
pub use error::{ParseError, ShellError};
/// Just a convenient re-export of the expression evaluator.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;

/// Serializes tests that change the process working directory.
#[cfg(test)]
pub(crate) fn lock_current_dir() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
