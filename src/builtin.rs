use crate::command::{Command, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;

/// Commands that change the interpreter's own state and therefore never run
/// as child processes.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Return value follows shell conventions: 0 for success.
    fn execute(self, env: &mut Environment) -> Result<ExitCode, ShellError>;
}

/// Whether `name` is handled inside the interpreter.
pub fn is_builtin(name: &str) -> bool {
    name == Cd::name() || name == Exit::name()
}

/// Run `command` if it names a builtin. Returns `None` for anything else.
pub fn run_builtin(
    command: &Command,
    env: &mut Environment,
    stdout: &mut dyn Write,
) -> Option<Result<ExitCode, ShellError>> {
    match command.name.as_str() {
        "cd" => Some(dispatch::<Cd>(command, env, stdout)),
        "exit" => Some(dispatch::<Exit>(command, env, stdout)),
        _ => None,
    }
}

fn dispatch<T: BuiltinCommand>(
    command: &Command,
    env: &mut Environment,
    stdout: &mut dyn Write,
) -> Result<ExitCode, ShellError> {
    let operands: Vec<&str> = command.operands().iter().map(String::as_str).collect();
    match T::from_args(&[T::name()], &operands) {
        Ok(cmd) => cmd.execute(env),
        Err(EarlyExit {
            output,
            status: Ok(()),
        }) => {
            // --help
            stdout.write_all(output.as_bytes())?;
            Ok(0)
        }
        Err(EarlyExit { output, .. }) => Err(ShellError::Validation(format!(
            "{}: {}",
            T::name(),
            output.trim_end()
        ))),
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: String,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, env: &mut Environment) -> Result<ExitCode, ShellError> {
        let new_dir = env.absolutize(&self.target);

        let canonical = fs::canonicalize(&new_dir)
            .ok()
            .filter(|dir| dir.is_dir())
            .ok_or_else(|| {
                ShellError::Validation(format!("cd: {}: no such directory", self.target))
            })?;

        env::set_current_dir(&canonical)?;
        log::debug!("cd {}", canonical.display());
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the interpreter.
pub struct Exit {
    #[argh(positional, default = "0")]
    /// exit status of the interpreter process, 0 when omitted.
    pub code: ExitCode,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, env: &mut Environment) -> Result<ExitCode, ShellError> {
        env.exit_request = Some(self.code);
        Ok(self.code)
    }
}
