//! End-to-end runs against real programs from `/bin` and `/usr/bin`.
#![cfg(unix)]

use bracesh::{Environment, Interpreter};
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Diagnostics(Arc<Mutex<Vec<u8>>>);

impl Write for Diagnostics {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Diagnostics {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn shell_in(dir: &Path, heredoc_input: &str) -> (Interpreter, Diagnostics) {
    let diagnostics = Diagnostics::default();
    let sh = Interpreter::new(Environment::with_path(dir, "/bin:/usr/bin"))
        .with_heredoc_input(Box::new(Cursor::new(heredoc_input.to_string())))
        .with_diagnostics(Box::new(diagnostics.clone()));
    (sh, diagnostics)
}

fn scratch() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn read(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).unwrap_or_default()
}

#[test]
fn test_output_redirection_truncates_and_appends() {
    let dir = scratch();
    let (mut sh, _) = shell_in(dir.path(), "");

    assert_eq!(sh.run_line("echo first > out.txt"), 0);
    assert_eq!(sh.run_line("echo second > out.txt"), 0);
    assert_eq!(read(&dir, "out.txt"), "second\n");

    assert_eq!(sh.run_line("echo third >> out.txt"), 0);
    assert_eq!(read(&dir, "out.txt"), "second\nthird\n");
}

#[test]
fn test_input_redirection() {
    let dir = scratch();
    fs::write(dir.path().join("words"), "b\na\nc\n").unwrap();
    let (mut sh, _) = shell_in(dir.path(), "");

    assert_eq!(sh.run_line("sort < words > sorted"), 0);
    assert_eq!(read(&dir, "sorted"), "a\nb\nc\n");
}

#[test]
fn test_pipeline_connects_stages() {
    let dir = scratch();
    let (mut sh, _) = shell_in(dir.path(), "");

    assert_eq!(sh.run_line("echo one two three | wc -w > count"), 0);
    assert_eq!(read(&dir, "count").trim(), "3");

    assert_eq!(sh.run_line("ls | wc -l > lines"), 0);
    assert!(read(&dir, "lines").trim().parse::<u32>().is_ok());
}

#[test]
fn test_pipeline_status_is_last_stage() {
    let dir = scratch();
    let (mut sh, _) = shell_in(dir.path(), "");

    assert_eq!(sh.run_line("false | true"), 0);
    assert_eq!(sh.run_line("true | false"), 1);
    assert_eq!(sh.run_line(r#"sh -c "exit 3""#), 3);
}

#[test]
fn test_signal_status() {
    let dir = scratch();
    let (mut sh, _) = shell_in(dir.path(), "");
    assert_eq!(sh.run_line(r#"sh -c "kill -9 $$""#), 137);
}

#[test]
fn test_heredoc_body_comes_from_session_input() {
    let dir = scratch();
    let (mut sh, _) = shell_in(dir.path(), "alpha\nbeta\nEOF\nnot part of it\n");

    assert_eq!(sh.run_line("cat << EOF > body"), 0);
    assert_eq!(read(&dir, "body"), "alpha\nbeta\n");
}

#[test]
fn test_conditional_operators_short_circuit() {
    let dir = scratch();
    let (mut sh, _) = shell_in(dir.path(), "");

    assert_eq!(sh.run_line("false && echo no > and.txt"), 1);
    assert!(!dir.path().join("and.txt").exists());

    assert_eq!(sh.run_line("false || echo yes > or.txt"), 0);
    assert_eq!(read(&dir, "or.txt"), "yes\n");

    assert_eq!(sh.run_line("{false ; true} && echo grouped > group.txt"), 0);
    assert_eq!(read(&dir, "group.txt"), "grouped\n");
}

#[test]
fn test_constants_expand_in_arguments_and_targets() {
    let dir = scratch();
    let (mut sh, _) = shell_in(dir.path(), "");

    assert_eq!(
        sh.run_line(r#"NAME = world ; echo hello $NAME "$NAME" > $NAME.txt"#),
        0
    );
    assert_eq!(read(&dir, "world.txt"), "hello world $NAME\n");
}

#[test]
fn test_background_returns_immediately() {
    let dir = scratch();
    let (mut sh, _) = shell_in(dir.path(), "");

    let started = Instant::now();
    assert_eq!(sh.run_line("sleep 5 &"), 0);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_errors_do_not_stop_sequencing() {
    let dir = scratch();
    let (mut sh, diagnostics) = shell_in(dir.path(), "");

    assert_eq!(sh.run_line("no-such-command-here ; echo after > after.txt"), 0);
    assert_eq!(read(&dir, "after.txt"), "after\n");

    assert_eq!(sh.run_line("echo x > missing/dir/out"), 1);

    let text = diagnostics.text();
    assert!(text.contains("bracesh: no-such-command-here: not a valid command"));
    assert!(text.contains("cannot open file"));
}

#[test]
fn test_path_changes_resolution() {
    let dir = scratch();
    let (mut sh, diagnostics) = shell_in(dir.path(), "");

    assert_eq!(sh.run_line("PATH = /nonexistent && ls"), 1);
    assert!(diagnostics.text().contains("ls: not a valid command"));
    assert_eq!(sh.run_line("/bin/sh -c true"), 0);
}

#[test]
fn test_cd_moves_the_session() {
    let dir = scratch();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let original = std::env::current_dir().unwrap();
    let (mut sh, _) = shell_in(dir.path(), "");

    let status = sh.run_line("cd sub && pwd > where.txt");
    std::env::set_current_dir(&original).unwrap();

    assert_eq!(status, 0);
    let sub = fs::canonicalize(dir.path().join("sub")).unwrap();
    assert_eq!(sh.env().current_dir, sub);
    assert_eq!(
        fs::read_to_string(sub.join("where.txt")).unwrap().trim(),
        sub.to_str().unwrap()
    );
}
