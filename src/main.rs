use anyhow::{Result, bail};
use argh::FromArgs;
use dbshell::command::{ExitCode, Outcome};
use dbshell::connection::{DEFAULT_CONNECTION, Driver};
use dbshell::options::{OptionValue, ShellOption};
use dbshell::profile;
use dbshell::{Console, Interpreter, PROGRAM, RunStatus, Session, SqliteDriver, Statement, VERSION};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `DBSHELL_LOG=debug`.
const LOG_ENV: &str = "DBSHELL_LOG";

#[derive(FromArgs)]
/// Interactive shell for SQL databases. Without -e, -l, -s or scripts the
/// shell reads statements from the terminal.
struct Args {
    /// keep going after errors
    #[argh(switch, short = 'c')]
    continue_on_error: bool,

    /// connect to this data source before running anything
    #[argh(option, short = 'D')]
    dsn: Option<String>,

    /// run a statement and exit; may be repeated
    #[argh(option, short = 'e')]
    exec: Vec<String>,

    /// start-up script to run instead of the profiles
    #[argh(option, short = 'f')]
    config: Option<PathBuf>,

    /// list the known data sources and exit
    #[argh(switch, short = 'l')]
    list: bool,

    /// do not run start-up scripts
    #[argh(switch, short = 'N')]
    no_profile: bool,

    /// write results to this file
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// print nothing but results and fatal errors
    #[argh(switch, short = 'q')]
    quiet: bool,

    /// print catalog information (datatypes, dsn, owners, qualifiers, tables, types) and exit
    #[argh(option, short = 's')]
    show: Option<String>,

    /// print version information and exit
    #[argh(switch, short = 'V')]
    version: bool,

    /// report progress
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// scripts to run, in order
    #[argh(positional)]
    scripts: Vec<PathBuf>,
}

impl Args {
    fn interactive(&self) -> bool {
        self.exec.is_empty() && self.show.is_none() && self.scripts.is_empty()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn configure(sh: &mut Interpreter, args: &Args) -> Result<()> {
    let options = &mut sh.session_mut().options;
    if args.continue_on_error || args.interactive() {
        options.store(ShellOption::Continue, OptionValue::Bool(true))?;
    }
    if args.quiet {
        options.store(ShellOption::Silent, OptionValue::Bool(true))?;
    }
    if args.verbose {
        options.store(ShellOption::Verbose, OptionValue::Bool(true))?;
    }
    if let Some(path) = &args.config {
        options.store(
            ShellOption::ConfFile,
            OptionValue::Text(path.display().to_string()),
        )?;
    }
    Ok(())
}

fn run_profiles(sh: &mut Interpreter, args: &Args) -> Result<RunStatus> {
    if args.no_profile || (args.config.is_none() && !args.scripts.is_empty()) {
        return Ok(RunStatus::Completed);
    }
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let cwd = std::env::current_dir()?;
    let scripts = profile::startup_scripts(
        sh.session().options.conffile(),
        home.as_deref(),
        &cwd,
    );
    Ok(profile::run_startup(sh, &scripts)?)
}

fn run_scripts(sh: &mut Interpreter, scripts: &[PathBuf]) -> ExitCode {
    for path in scripts {
        match sh.run_script(path) {
            Ok(RunStatus::Completed) => {}
            Ok(status) => return status.exit_code(),
            Err(err) => {
                sh.session_mut().report(&err);
                return 1;
            }
        }
    }
    0
}

fn run(args: Args) -> Result<ExitCode> {
    let modes = [!args.exec.is_empty(), args.list, args.show.is_some()];
    if modes.iter().filter(|&&on| on).count() > 1 {
        bail!("-e, -l and -s cannot be combined");
    }

    let driver = SqliteDriver;
    if args.version {
        println!("{PROGRAM} {VERSION}");
        println!("driver: {} ({})", driver.name(), driver.version());
        return Ok(0);
    }
    if args.list {
        for ds in driver.data_sources() {
            println!("{:<20} {}", ds.name, ds.description);
        }
        return Ok(0);
    }

    let session = Session::new(Box::new(driver), Console::stdio());
    let mut sh = Interpreter::with_builtins(session)?;
    configure(&mut sh, &args)?;

    if let Some(path) = &args.output {
        sh.session_mut().open_output(path)?;
    }
    if let Some(dsn) = &args.dsn {
        sh.session_mut().connect(DEFAULT_CONNECTION, dsn)?;
    }

    let status = run_profiles(&mut sh, &args)?;
    if !matches!(status, RunStatus::Completed) {
        return Ok(status.exit_code());
    }

    let code = if !args.exec.is_empty() {
        let mut code = 0;
        for stmt in &args.exec {
            debug!(stmt = %stmt, "running -e statement");
            let status = sh.run_str(stmt);
            if !matches!(status, RunStatus::Completed) {
                code = status.exit_code();
                break;
            }
        }
        code
    } else if let Some(data) = &args.show {
        let stmt = Statement {
            argv: vec!["SHOW".to_string(), data.clone()],
            text: format!("SHOW {data}"),
        };
        match sh.dispatch(&stmt) {
            Outcome::Ok => 0,
            Outcome::Terminate(code) => code,
            Outcome::Recoverable(_) | Outcome::Fatal(_) => 1,
        }
    } else if !args.scripts.is_empty() {
        run_scripts(&mut sh, &args.scripts)
    } else {
        sh.repl()?
    };

    let session = sh.session_mut();
    session.close_all()?;
    session.close_output()?;
    session.flush()?;
    Ok(code)
}

fn main() {
    init_tracing();
    let args: Args = argh::from_env();
    let code = match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{PROGRAM}: {err:#}");
            1
        }
    };
    std::process::exit(code);
}
