//! Turning an [`Invocation`] into running processes.
//!
//! Work is split in two steps. [`plan`] resolves programs, makes redirection
//! paths absolute and collects heredoc bodies, producing plain data. [`execute`]
//! wires pipes and files and hands each stage to a [`Launcher`]. The launcher
//! is the only piece that touches the process table, so tests substitute it.

use crate::command::{ExitCode, FAILURE, Invocation, RedirectKind};
use crate::env::Environment;
use crate::error::ShellError;
use crate::external;
use os_pipe::{PipeReader, PipeWriter};
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::thread;

/// Where a stage reads from.
#[derive(Debug)]
pub enum StageInput {
    /// The interpreter's own standard input.
    Inherit,
    Pipe(PipeReader),
    File(File),
}

impl StageInput {
    pub fn into_stdio(self) -> Stdio {
        match self {
            StageInput::Inherit => Stdio::inherit(),
            StageInput::Pipe(r) => Stdio::from(r),
            StageInput::File(f) => Stdio::from(f),
        }
    }
}

/// Where a stage writes to.
#[derive(Debug)]
pub enum StageOutput {
    /// The interpreter's own standard output.
    Inherit,
    Pipe(PipeWriter),
    File(File),
}

impl StageOutput {
    pub fn into_stdio(self) -> Stdio {
        match self {
            StageOutput::Inherit => Stdio::inherit(),
            StageOutput::Pipe(w) => Stdio::from(w),
            StageOutput::File(f) => Stdio::from(f),
        }
    }
}

/// Process group placement of a spawned stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessGroup {
    /// Stay in the interpreter's group.
    Inherit,
    /// Lead a new group.
    New,
    /// Join the group led by this pid.
    Join(u32),
}

/// Everything a launcher needs to start one stage.
#[derive(Debug)]
pub struct SpawnRequest<'a> {
    pub program: &'a Path,
    /// Full argument vector; `args[0]` is the command name.
    pub args: &'a [String],
    pub current_dir: &'a Path,
    pub stdin: StageInput,
    pub stdout: StageOutput,
    pub group: ProcessGroup,
}

/// Process creation primitive.
pub trait Launcher {
    fn spawn(&mut self, request: SpawnRequest<'_>) -> io::Result<Box<dyn RunningStage>>;
}

/// A started stage that can be waited on.
pub trait RunningStage: Send {
    fn id(&self) -> u32;

    /// Block until the stage finishes and return its exit status.
    fn wait(self: Box<Self>) -> io::Result<ExitCode>;
}

/// Source of heredoc lines: the interpreter's original input.
pub trait LineSource {
    /// Append one line, newline included, to `buf`. Returns 0 at end of input.
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize>;
}

impl LineSource for io::Stdin {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        io::Stdin::read_line(self, buf)
    }
}

impl<T: AsRef<[u8]>> LineSource for Cursor<T> {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        io::BufRead::read_line(self, buf)
    }
}

/// Stream replacement applied to a stage before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOverride {
    Input(PathBuf),
    Output(PathBuf),
    Append(PathBuf),
    Heredoc(String),
}

/// One resolved stage.
#[derive(Debug)]
pub struct StagePlan {
    pub args: Vec<String>,
    /// The executable, or the reason the stage cannot run.
    pub program: Result<PathBuf, ShellError>,
    /// Overrides in the order they were written.
    pub streams: Vec<StreamOverride>,
}

/// A pipeline ready to execute.
#[derive(Debug)]
pub struct PipelinePlan {
    pub stages: Vec<StagePlan>,
    pub background: bool,
}

/// Resolve every stage of `invocation`.
///
/// Heredoc bodies are read from `input` here, in stage order.
pub fn plan(
    invocation: Invocation,
    env: &Environment,
    input: &mut dyn LineSource,
) -> PipelinePlan {
    let stages = invocation
        .commands
        .into_iter()
        .map(|command| {
            let mut program = external::resolve(env, &command.name);
            let mut streams = Vec::with_capacity(command.redirections.len());
            for redirection in command.redirections {
                let target = redirection.target;
                let stream = match redirection.kind {
                    RedirectKind::Input => StreamOverride::Input(env.absolutize(target)),
                    RedirectKind::Output => StreamOverride::Output(env.absolutize(target)),
                    RedirectKind::OutputAppend => StreamOverride::Append(env.absolutize(target)),
                    RedirectKind::Heredoc => match read_heredoc(input, &target) {
                        Ok(body) => StreamOverride::Heredoc(body),
                        Err(err) => {
                            program = Err(err.into());
                            continue;
                        }
                    },
                };
                streams.push(stream);
            }
            StagePlan {
                args: command.args,
                program,
                streams,
            }
        })
        .collect();

    PipelinePlan {
        stages,
        background: invocation.background,
    }
}

/// Collect lines until one equals `delimiter` exactly.
///
/// End of input also ends the body.
pub fn read_heredoc(input: &mut dyn LineSource, delimiter: &str) -> io::Result<String> {
    let mut body = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            log::warn!("heredoc ended by end of input, wanted {delimiter:?}");
            return Ok(body);
        }
        let content = line.strip_suffix('\n').unwrap_or(&line);
        let content = content.strip_suffix('\r').unwrap_or(content);
        if content == delimiter {
            return Ok(body);
        }
        body.push_str(content);
        body.push('\n');
    }
}

enum StageFailure {
    /// The stage did not run; siblings are unaffected.
    Skipped(ShellError),
    /// Process creation failed; no further stages are started.
    Spawn(ShellError),
}

/// Run a planned pipeline.
///
/// Foreground pipelines are waited on and yield the status of their last
/// stage. Background pipelines are put in one new process group, reaped by a
/// helper thread and reported as success right away. Every error is passed to
/// `report`; none of them stops the interpreter.
pub fn execute(
    plan: PipelinePlan,
    launcher: &mut dyn Launcher,
    current_dir: &Path,
    report: &mut dyn FnMut(ShellError),
) -> ExitCode {
    let count = plan.stages.len();
    let mut group = if plan.background {
        ProcessGroup::New
    } else {
        ProcessGroup::Inherit
    };
    let mut running: Vec<Option<Box<dyn RunningStage>>> = Vec::with_capacity(count);
    let mut upstream: Option<PipeReader> = None;

    for (idx, stage) in plan.stages.into_iter().enumerate() {
        let stdin = match upstream.take() {
            Some(reader) => StageInput::Pipe(reader),
            None => StageInput::Inherit,
        };
        let stdout = if idx + 1 == count {
            StageOutput::Inherit
        } else {
            match os_pipe::pipe() {
                Ok((reader, writer)) => {
                    upstream = Some(reader);
                    StageOutput::Pipe(writer)
                }
                Err(err) => {
                    report(err.into());
                    break;
                }
            }
        };

        match launch_stage(stage, stdin, stdout, group, launcher, current_dir) {
            Ok(child) => {
                if group == ProcessGroup::New {
                    group = ProcessGroup::Join(child.id());
                }
                running.push(Some(child));
            }
            Err(StageFailure::Skipped(err)) => {
                report(err);
                running.push(None);
            }
            Err(StageFailure::Spawn(err)) => {
                report(err);
                break;
            }
        }
    }
    drop(upstream);

    if plan.background {
        let children: Vec<_> = running.into_iter().flatten().collect();
        if !children.is_empty() {
            thread::spawn(move || {
                for child in children {
                    let id = child.id();
                    let status = child.wait();
                    log::debug!("background pid {id} finished: {status:?}");
                }
            });
        }
        return 0;
    }

    let started = running.len();
    let mut last_status = FAILURE;
    for child in running {
        last_status = match child {
            Some(child) => child.wait().unwrap_or_else(|err| {
                report(err.into());
                FAILURE
            }),
            None => FAILURE,
        };
    }
    if started < count {
        // The last stage was never started.
        return FAILURE;
    }
    last_status
}

fn launch_stage(
    stage: StagePlan,
    mut stdin: StageInput,
    mut stdout: StageOutput,
    group: ProcessGroup,
    launcher: &mut dyn Launcher,
    current_dir: &Path,
) -> Result<Box<dyn RunningStage>, StageFailure> {
    for stream in stage.streams {
        match stream {
            StreamOverride::Input(path) => {
                stdin = StageInput::File(open_redirect(&path, OpenOptions::new().read(true))?);
            }
            StreamOverride::Output(path) => {
                let mut options = OpenOptions::new();
                options.write(true).create(true).truncate(true);
                stdout = StageOutput::File(open_redirect(&path, &options)?);
            }
            StreamOverride::Append(path) => {
                let mut options = OpenOptions::new();
                options.append(true).create(true);
                stdout = StageOutput::File(open_redirect(&path, &options)?);
            }
            StreamOverride::Heredoc(body) => {
                stdin = heredoc_input(body).map_err(|e| StageFailure::Skipped(e.into()))?;
            }
        }
    }

    let program = stage.program.map_err(StageFailure::Skipped)?;
    launcher
        .spawn(SpawnRequest {
            program: &program,
            args: &stage.args,
            current_dir,
            stdin,
            stdout,
            group,
        })
        .map_err(|source| StageFailure::Spawn(ShellError::Spawn { program, source }))
}

fn open_redirect(path: &Path, options: &OpenOptions) -> Result<File, StageFailure> {
    options.open(path).map_err(|source| {
        StageFailure::Skipped(ShellError::Redirection {
            path: path.to_path_buf(),
            source,
        })
    })
}

/// Feed `body` to a pipe from a helper thread so large bodies cannot block us.
fn heredoc_input(body: String) -> io::Result<StageInput> {
    let (reader, mut writer) = os_pipe::pipe()?;
    thread::spawn(move || {
        if let Err(err) = writer.write_all(body.as_bytes()) {
            log::debug!("heredoc writer stopped: {err}");
        }
    });
    Ok(StageInput::Pipe(reader))
}
