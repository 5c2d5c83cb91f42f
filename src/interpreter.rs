use crate::builtin;
use crate::command::{ExitCode, FAILURE, Invocation, RedirectKind, Redirection, SYNTAX_ERROR};
use crate::env::Environment;
use crate::error::{ParseError, ShellError};
use crate::expand::expand_word;
use crate::external::OsLauncher;
use crate::lexer::{self, Operator, TokenKind};
use crate::parser::{self, Expr, Statement};
use crate::pipeline::{self, Launcher, LineSource};
use std::io::{self, Write};

const SUCCESS: ExitCode = 0;

/// Expression evaluator and the session it runs in.
///
/// The interpreter owns the [`Environment`], the [`Launcher`] used to start
/// pipelines, the input heredoc bodies are read from, and the sink diagnostics
/// are written to. Each of them can be replaced, which is how the tests run
/// without a terminal.
///
/// Example
/// ```
/// use bracesh::{Environment, Interpreter};
/// let mut sh = Interpreter::new(Environment::with_path("/", "/bin:/usr/bin"));
/// assert_eq!(sh.run_line("X = 5"), 0);
/// assert_eq!(sh.env().get_var("X"), "5");
/// ```
pub struct Interpreter {
    env: Environment,
    launcher: Box<dyn Launcher>,
    heredoc_input: Box<dyn LineSource>,
    diagnostics: Box<dyn Write>,
}

impl Interpreter {
    /// Create an interpreter that spawns real processes, reads heredocs from
    /// standard input and reports to standard error.
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            launcher: Box::new(OsLauncher),
            heredoc_input: Box::new(io::stdin()),
            diagnostics: Box::new(io::stderr()),
        }
    }

    pub fn with_launcher(mut self, launcher: Box<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_heredoc_input(mut self, input: Box<dyn LineSource>) -> Self {
        self.heredoc_input = input;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Box<dyn Write>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Evaluate one top-level input.
    ///
    /// Parse errors are reported here and give status 2; the session stays usable.
    pub fn run_line(&mut self, line: &str) -> ExitCode {
        match self.evaluate(line) {
            Ok(status) => status,
            Err(err) => {
                self.report(&ShellError::from(err));
                SYNTAX_ERROR
            }
        }
    }

    /// Evaluate `line` as the whole session, as `-c` does.
    ///
    /// Returns the status requested by `exit` if the line ran it, otherwise
    /// the status of the line.
    pub fn run_command(&mut self, line: &str) -> ExitCode {
        let status = self.run_line(line);
        self.env.exit_request.unwrap_or(status)
    }

    /// Evaluate an expression.
    ///
    /// Only parse errors escape; every other failure has already been reported
    /// and is part of the returned status.
    pub fn evaluate(&mut self, expr: &str) -> Result<ExitCode, ParseError> {
        match parser::parse_expr(expr)? {
            Expr::Empty => Ok(SUCCESS),
            Expr::Statement(statement) => self.eval_statement(statement),
            Expr::Binary {
                left,
                op: Operator::Assign,
                right,
            } => self.eval_assignment(left, right),
            Expr::Binary { left, op, right } => {
                let status = self.eval_statement(left)?;
                self.continue_with(status, op, right)
            }
        }
    }

    /// Apply `op` to the status of its left statement.
    fn continue_with(
        &mut self,
        status: ExitCode,
        op: Operator,
        right: &str,
    ) -> Result<ExitCode, ParseError> {
        match op {
            Operator::And if status == SUCCESS => self.evaluate(right),
            Operator::And => Ok(status),
            Operator::Or if status == SUCCESS => Ok(SUCCESS),
            Operator::Or => self.evaluate(right),
            Operator::Sequence => self.evaluate(right),
            Operator::Assign => {
                self.report(&ShellError::Validation(
                    "unexpected '=' after an assigned value".to_string(),
                ));
                Ok(FAILURE)
            }
        }
    }

    /// `name = value [op rest]`: the leftmost statement of the right side is
    /// the value, anything after it continues with the assignment's status.
    fn eval_assignment(&mut self, name: &str, right: &str) -> Result<ExitCode, ParseError> {
        let (value, rest) = match parser::parse_expr(right)? {
            Expr::Binary { left, op, right } => (left, Some((op, right))),
            Expr::Statement(value) => (value, None),
            Expr::Empty => ("", None),
        };

        let value = self.assigned_value(value)?;
        let status = match self.env.set_var(name, value) {
            Ok(()) => SUCCESS,
            Err(err) => {
                self.report(&err);
                FAILURE
            }
        };

        match rest {
            Some((op, rest)) => self.continue_with(status, op, rest),
            None => Ok(status),
        }
    }

    /// Words of an assigned value are expanded like arguments and joined by one space.
    fn assigned_value(&self, text: &str) -> Result<String, ParseError> {
        let words: Vec<String> = lexer::tokenize(text)?
            .iter()
            .map(|token| match token.kind {
                TokenKind::Quoted => token.text.to_string(),
                _ => expand_word(token.text, &self.env),
            })
            .collect();
        Ok(words.join(" "))
    }

    fn eval_statement(&mut self, text: &str) -> Result<ExitCode, ParseError> {
        match parser::parse_statement(text)? {
            Statement::Braced(inner) => self.evaluate(inner),
            Statement::Invocation(text) => {
                let invocation = parser::parse_invocation(text, &self.env)?;
                Ok(self.run_invocation(invocation))
            }
        }
    }

    fn run_invocation(&mut self, invocation: Invocation) -> ExitCode {
        if let Some(command) = invocation
            .commands
            .iter()
            .find(|c| builtin::is_builtin(&c.name))
        {
            if invocation.commands.len() > 1 {
                let err = ShellError::Validation(format!(
                    "{}: must be the only command of its pipeline",
                    command.name
                ));
                self.report(&err);
                return FAILURE;
            }
            if !command.redirections.is_empty() {
                self.discard_heredocs(&command.redirections);
                let err = ShellError::Validation(format!(
                    "{}: redirections are not supported",
                    command.name
                ));
                self.report(&err);
                return FAILURE;
            }
            let result = builtin::run_builtin(command, &mut self.env, &mut io::stdout());
            return match result {
                Some(Ok(status)) => status,
                Some(Err(err)) => {
                    self.report(&err);
                    FAILURE
                }
                None => FAILURE,
            };
        }

        let plan = pipeline::plan(invocation, &self.env, &mut *self.heredoc_input);
        let diagnostics = &mut self.diagnostics;
        pipeline::execute(
            plan,
            &mut *self.launcher,
            &self.env.current_dir,
            &mut |err| write_diagnostic(diagnostics, &err),
        )
    }

    /// Consume heredoc bodies of a command that will not run, so their lines
    /// are not read back as input.
    fn discard_heredocs(&mut self, redirections: &[Redirection]) {
        for redirection in redirections {
            if redirection.kind != RedirectKind::Heredoc {
                continue;
            }
            let input = &mut *self.heredoc_input;
            if let Err(err) = pipeline::read_heredoc(input, &redirection.target) {
                log::debug!("discarding heredoc failed: {err}");
            }
        }
    }

    fn report(&mut self, err: &ShellError) {
        write_diagnostic(&mut self.diagnostics, err);
    }
}

impl Default for Interpreter {
    /// Interpreter for the current process, `PATH` seeded to `<cwd>/bin`.
    fn default() -> Self {
        Self::new(Environment::new())
    }
}

fn write_diagnostic(out: &mut Box<dyn Write>, err: &ShellError) {
    log::debug!("reported: {err:?}");
    if writeln!(out, "bracesh: {err}").is_err() {
        log::error!("cannot write diagnostic: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{RunningStage, SpawnRequest, StageInput};
    use std::cell::RefCell;
    use std::io::{Cursor, Read};
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    /// Pretends every command exists; `false` fails, `cat` echoes its heredoc
    /// into the log, everything else succeeds.
    #[derive(Clone, Default)]
    struct ScriptedLauncher {
        log: Arc<Mutex<Vec<String>>>,
    }

    struct Done(ExitCode);

    impl RunningStage for Done {
        fn id(&self) -> u32 {
            1
        }

        fn wait(self: Box<Self>) -> io::Result<ExitCode> {
            Ok(self.0)
        }
    }

    impl Launcher for ScriptedLauncher {
        fn spawn(&mut self, request: SpawnRequest<'_>) -> io::Result<Box<dyn RunningStage>> {
            let mut line = request.args.join(" ");
            if let StageInput::Pipe(mut r) = request.stdin {
                if request.args[0] == "cat" {
                    let mut body = String::new();
                    r.read_to_string(&mut body)?;
                    line = format!("{line} <<{body:?}");
                }
            }
            self.log.lock().unwrap().push(line);
            let code = if request.args[0] == "false" { 1 } else { 0 };
            Ok(Box::new(Done(code)))
        }
    }

    /// Diagnostics sink readable after the interpreter took ownership.
    #[derive(Clone, Default)]
    struct Captured(Rc<RefCell<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    struct Harness {
        sh: Interpreter,
        log: Arc<Mutex<Vec<String>>>,
        errors: Captured,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_input("")
        }

        fn with_input(input: &str) -> Self {
            let launcher = ScriptedLauncher::default();
            let log = launcher.log.clone();
            let errors = Captured::default();
            let sh = Interpreter::new(Environment::with_path("/", "/bin:/usr/bin"))
                .with_launcher(Box::new(launcher))
                .with_heredoc_input(Box::new(Cursor::new(input.to_string())))
                .with_diagnostics(Box::new(errors.clone()));
            Self { sh, log, errors }
        }

        fn ran(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_empty_expression_succeeds() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("   "), 0);
        assert!(h.ran().is_empty());
    }

    #[test]
    fn test_and_short_circuits() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("false && echo hi"), 1);
        assert_eq!(h.ran(), vec!["false"]);

        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("true && echo hi"), 0);
        assert_eq!(h.ran(), vec!["true", "echo hi"]);
    }

    #[test]
    fn test_or_runs_right_only_on_failure() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("false || echo hi"), 0);
        assert_eq!(h.ran(), vec!["false", "echo hi"]);

        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("true || echo hi"), 0);
        assert_eq!(h.ran(), vec!["true"]);
    }

    #[test]
    fn test_sequence_ignores_left_status() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("false ; true ; false"), 1);
        assert_eq!(h.ran(), vec!["false", "true", "false"]);
    }

    #[test]
    fn test_chains_peel_one_statement_at_a_time() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("false && echo a || echo b"), 1);
        assert_eq!(h.ran(), vec!["false"]);

        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("{false && echo a} || echo b"), 0);
        assert_eq!(h.ran(), vec!["false", "echo b"]);
    }

    #[test]
    fn test_braced_expression_is_one_statement() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("{ echo a ; {echo b} } && echo c"), 0);
        assert_eq!(h.ran(), vec!["echo a", "echo b", "echo c"]);
    }

    #[test]
    fn test_assignment_then_expansion() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("X = 5"), 0);
        assert_eq!(h.sh.run_line("echo $X"), 0);
        assert_eq!(h.ran(), vec!["echo 5"]);
    }

    #[test]
    fn test_assignment_continues_with_rest() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line(r#"G = "a b" ; echo $G "$G""#), 0);
        assert_eq!(h.sh.env().get_var("G"), "a b");
        assert_eq!(h.ran(), vec!["echo a b $G"]);
    }

    #[test]
    fn test_assignment_value_is_expanded() {
        let mut h = Harness::new();
        h.sh.run_line("PATH = $PATH:/opt/bin");
        assert_eq!(h.sh.env().search_path(), "/bin:/usr/bin:/opt/bin");
    }

    #[test]
    fn test_invalid_assignment_reports_and_fails() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("1X = 5 && echo no"), 1);
        assert!(h.ran().is_empty());
        assert!(h.errors.text().contains("invalid constant name '1X'"));

        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("1X = 5 ; echo yes"), 0);
        assert_eq!(h.ran(), vec!["echo yes"]);
    }

    #[test]
    fn test_parse_error_is_reported_and_session_survives() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("{ a"), SYNTAX_ERROR);
        assert!(h.errors.text().contains("failed to match brace"));
        assert_eq!(h.sh.run_line("echo ok"), 0);
        assert_eq!(h.ran(), vec!["echo ok"]);
    }

    #[test]
    fn test_lexical_errors_stop_the_whole_input() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("echo a ; echo \"b ; echo c"), SYNTAX_ERROR);
        assert!(h.ran().is_empty());
        assert!(h.errors.text().contains("unterminated quote"));
    }

    #[test]
    fn test_parse_error_in_right_operand_aborts_rest() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("echo a ; cat > ; echo c"), SYNTAX_ERROR);
        assert_eq!(h.ran(), vec!["echo a"]);
        assert!(h.errors.text().contains("expected file name after '>'"));
    }

    #[test]
    fn test_operand_errors() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("&& echo"), SYNTAX_ERROR);
        assert_eq!(h.sh.run_line("echo ;"), SYNTAX_ERROR);
        assert_eq!(h.sh.run_line("echo | | wc"), SYNTAX_ERROR);
        assert!(h.ran().is_empty());
        let errors = h.errors.text();
        assert!(errors.contains("left statement of '&&' is empty"));
        assert!(errors.contains("expected expression after operator ';'"));
        assert!(errors.contains("empty command around '|'"));
    }

    #[test]
    fn test_unknown_command_blocks_and_but_not_sequence() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("no-such-command-here && echo no"), 1);
        assert!(h.errors.text().contains("no-such-command-here: not a valid command"));
        assert_eq!(h.sh.run_line("no-such-command-here ; echo yes"), 0);
        assert_eq!(h.ran(), vec!["echo yes"]);
    }

    #[test]
    fn test_heredoc_reads_from_session_input() {
        let mut h = Harness::with_input("line one\nline two\nEND\nleft over\n");
        assert_eq!(h.sh.run_line("cat << END"), 0);
        assert_eq!(h.ran(), vec![r#"cat <<"line one\nline two\n""#]);
    }

    #[test]
    fn test_builtin_inside_pipeline_is_rejected() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("cd / | cat"), 1);
        assert!(h.errors.text().contains("cd: must be the only command of its pipeline"));
        assert!(h.ran().is_empty());
    }

    #[test]
    fn test_cd_with_wrong_argument_count_fails() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("cd || echo fallback"), 0);
        assert_eq!(h.ran(), vec!["echo fallback"]);
        assert!(h.errors.text().starts_with("bracesh: cd: "));
    }

    #[test]
    fn test_exit_requests_shutdown() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_line("exit 4"), 4);
        assert_eq!(h.sh.env().exit_request, Some(4));
    }

    #[test]
    fn test_run_command_exits_with_requested_status() {
        let mut h = Harness::new();
        assert_eq!(h.sh.run_command("exit 3 ; true"), 3);

        let mut h = Harness::new();
        assert_eq!(h.sh.run_command("true ; false"), 1);
    }

    #[test]
    fn test_builtin_redirections_are_rejected_and_heredoc_consumed() {
        let mut h = Harness::with_input("ignored\nEND\nkept\nEOF\n");
        assert_eq!(h.sh.run_line("cd / << END"), 1);
        assert!(h.errors.text().contains("cd: redirections are not supported"));
        assert_eq!(h.sh.env().current_dir, std::path::PathBuf::from("/"));

        assert_eq!(h.sh.run_line("cat << EOF"), 0);
        assert_eq!(h.ran(), vec![r#"cat <<"kept\n""#]);

        assert_eq!(h.sh.run_line("exit 2 > out"), 1);
        assert_eq!(h.sh.env().exit_request, None);
    }
}
