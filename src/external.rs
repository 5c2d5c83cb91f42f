//! Executable lookup and the launcher that starts real OS processes.

use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::ShellError;
use crate::pipeline::{Launcher, ProcessGroup, RunningStage, SpawnRequest};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};

/// Resolve a command name to an executable the way a typical shell would.
///
/// Behavior:
/// - Name containing a `/`: a literal path, relative names resolved against
///   the session working directory. Returned if it is executable.
/// - Otherwise: each directory of `PATH` in order, first executable
///   `<dir>/<name>` wins.
/// - Empty name: not found.
pub fn resolve(env: &Environment, name: &str) -> Result<PathBuf, ShellError> {
    let found = find_command_path(&env.search_path(), &env.current_dir, name);
    log::debug!("resolve {name:?} -> {found:?}");
    found.ok_or_else(|| ShellError::Resolution(name.to_string()))
}

/// Lookup behind [`resolve`], with the search path and working directory given explicitly.
pub fn find_command_path(search_paths: &str, current_dir: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    if name.contains('/') {
        let path = current_dir.join(name);
        return is_executable(&path).then_some(path);
    }

    std::env::split_paths(search_paths)
        .map(|dir| current_dir.join(dir).join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Launcher spawning children with `std::process`.
#[derive(Debug, Default)]
pub struct OsLauncher;

impl Launcher for OsLauncher {
    fn spawn(&mut self, request: SpawnRequest<'_>) -> io::Result<Box<dyn RunningStage>> {
        let mut cmd = std::process::Command::new(request.program);
        cmd.args(request.args.iter().skip(1))
            .stdin(request.stdin.into_stdio())
            .stdout(request.stdout.into_stdio())
            .current_dir(request.current_dir);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if let Some(name) = request.args.first() {
                cmd.arg0(name);
            }
            match request.group {
                ProcessGroup::Inherit => {}
                ProcessGroup::New => {
                    cmd.process_group(0);
                }
                ProcessGroup::Join(leader) => {
                    cmd.process_group(leader as i32);
                }
            }
        }

        let child = cmd.spawn()?;
        log::debug!(
            "spawned {} as pid {} ({:?})",
            request.program.display(),
            child.id(),
            request.group
        );
        Ok(Box::new(child))
    }
}

impl RunningStage for Child {
    fn id(&self) -> u32 {
        Child::id(self)
    }

    fn wait(mut self: Box<Self>) -> io::Result<ExitCode> {
        let status = Child::wait(&mut self)?;
        Ok(exit_code(status))
    }
}

/// Shell-style status of a finished process.
pub fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}
