use anyhow::Context;
use argh::FromArgs;
use bracesh::{Environment, Interpreter, env::PATH_VAR, repl};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

#[derive(FromArgs)]
/// Interactive command interpreter with pipelines, redirections and braced expressions.
struct Args {
    /// evaluate this expression and exit with its status instead of starting a prompt
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// initial value of the PATH constant (default: <launch directory>/bin)
    #[argh(option)]
    path: Option<String>,

    /// verbosity of diagnostics on stderr: off, error, warn, info, debug or trace
    #[argh(option, default = "LevelFilter::Warn")]
    log_level: LevelFilter,

    /// print version information and exit
    #[argh(switch)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    if args.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    TermLogger::init(
        args.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("failed to initialize logging")?;

    let mut env = Environment::new();
    if let Some(path) = args.path {
        env.set_var(PATH_VAR, path)?;
    }
    log::info!("PATH = {}", env.search_path());

    let mut interpreter = Interpreter::new(env);
    let status = match args.command {
        Some(expr) => interpreter.run_command(&expr),
        None => repl::run(&mut interpreter).context("line editor failed")?,
    };

    std::process::exit(status)
}
