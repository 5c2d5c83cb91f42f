//! Interactive read loop on top of [`Interpreter`].

use crate::command::ExitCode;
use crate::interpreter::Interpreter;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

const PROMPT: &str = "bracesh$ ";

/// Read lines until end of input or `exit`, evaluating each one.
///
/// Ctrl-C drops the current line and shows a fresh prompt. Returns the
/// status requested by `exit`, or the status of the last evaluated line.
pub fn run(interpreter: &mut Interpreter) -> rustyline::Result<ExitCode> {
    let mut rl = DefaultEditor::new()?;
    let mut status = 0;

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                }
                status = interpreter.run_line(&line);
                log::debug!("{line:?} exited with {status}");
                if let Some(code) = interpreter.env().exit_request {
                    return Ok(code);
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        }
    }

    Ok(status)
}
