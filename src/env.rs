use crate::command::ExitCode;
use crate::error::ShellError;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::{Path, PathBuf};

/// Name of the constant consulted by the command resolver.
pub const PATH_VAR: &str = "PATH";

/// Session state shared by every parse and evaluate call.
///
/// The environment contains:
/// - the named constants of the session (the variable store), with `PATH`
///   seeded at construction;
/// - `current_dir`: the working directory children are started in;
/// - `exit_request`: set by the `exit` built-in so a read loop knows when to stop.
#[derive(Debug, Clone)]
pub struct Environment {
    vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// Exit status requested by `exit`, if any.
    pub exit_request: Option<ExitCode>,
}

impl Environment {
    /// Capture the launch directory of the process and seed `PATH` to `<launch-dir>/bin`.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let path = current_dir.join("bin").to_string_lossy().into_owned();
        Self::with_path(current_dir, path)
    }

    /// Build an environment rooted at `current_dir` with an explicit `PATH` constant.
    pub fn with_path(current_dir: impl Into<PathBuf>, path: impl Into<String>) -> Self {
        let mut vars = HashMap::new();
        vars.insert(PATH_VAR.to_string(), path.into());
        Self {
            vars,
            current_dir: current_dir.into(),
            exit_request: None,
        }
    }

    /// Get the value of a constant. A missing name reads as the empty string.
    pub fn get_var(&self, key: &str) -> String {
        self.vars.get(key).cloned().unwrap_or_default()
    }

    /// Define or overwrite a constant.
    ///
    /// Fails when `key` is not a letter followed by letters and digits.
    pub fn set_var(
        &mut self,
        key: impl Into<String>,
        val: impl Into<String>,
    ) -> Result<(), ShellError> {
        let key = key.into();
        if !is_valid_name(&key) {
            return Err(ShellError::Validation(format!(
                "invalid constant name '{key}': \
                 must start with a letter and contain only letters and digits"
            )));
        }
        let val = val.into();
        log::debug!("set {key} = {val:?}");
        self.vars.insert(key, val);
        Ok(())
    }

    /// The current `PATH` constant.
    pub fn search_path(&self) -> String {
        self.get_var(PATH_VAR)
    }

    /// Resolve `path` against the session working directory.
    pub fn absolutize(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// A constant name is a letter followed by any number of letters or digits.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}
