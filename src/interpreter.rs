use crate::builtin;
use crate::command::{CommandDescriptor, CommandTable, ExitCode, Outcome};
use crate::error::ShellError;
use crate::segmenter::Segmenter;
use crate::session::Session;
use crate::tokenizer::{Mode, Statement};
use crate::{PROGRAM, VERSION};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use rustyline::history::History;
use std::fs::File;
use std::io::{self, Read};
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{debug, trace, warn};

/// Scripts are read in chunks of this many bytes.
pub const SCRIPT_CHUNK_SIZE: usize = 4096;

/// How deeply `SOURCE` may nest.
pub const MAX_SCRIPT_DEPTH: usize = 16;

const CONTINUATION_PROMPT: &str = "> ";

/// Name statements like `NAME = value` are handed to when `NAME` is not a command.
const ASSIGNMENT_COMMAND: &str = "SETENV";

/// How a run over some input ended.
#[derive(Debug)]
pub enum RunStatus {
    /// All input was consumed.
    Completed,
    /// A command asked the shell to exit.
    Terminated(ExitCode),
    /// An error stopped the run; it has been reported already.
    Stopped(ShellError),
}

impl RunStatus {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Terminated(code) => *code,
            RunStatus::Stopped(_) => 1,
        }
    }
}

/// Reads statements, dispatches them through the command table and applies
/// the continue-on-error policy.
///
/// Example
/// ```
/// use dbshell::{Console, Interpreter, Session, SqliteDriver};
///
/// let (console, out, _err) = Console::captured();
/// let session = Session::new(Box::new(SqliteDriver), console);
/// let mut sh = Interpreter::with_builtins(session).unwrap();
/// let status = sh.run_str("echo hello world;");
/// assert_eq!(status.exit_code(), 0);
/// assert_eq!(out.contents(), "hello\nworld\n");
/// ```
pub struct Interpreter {
    pub(crate) session: Session,
    commands: CommandTable,
}

impl Interpreter {
    /// Create a new interpreter with a custom command table.
    pub fn new(session: Session, commands: CommandTable) -> Self {
        Self { session, commands }
    }

    /// Create an interpreter knowing every built-in command.
    pub fn with_builtins(session: Session) -> Result<Self, ShellError> {
        Ok(Self::new(session, builtin::command_table()?))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Finds the command for a statement and checks its arguments.
    fn resolve(&self, stmt: &Statement) -> Result<CommandDescriptor, ShellError> {
        let name = stmt.name();
        let desc = match self.commands.lookup(name) {
            Some(desc) => *desc,
            None if stmt.argv.get(1).is_some_and(|tok| tok == "=") => *self
                .commands
                .lookup(ASSIGNMENT_COMMAND)
                .ok_or_else(|| ShellError::UnknownCommand(name.to_string()))?,
            None => return Err(ShellError::UnknownCommand(name.to_string())),
        };
        desc.check_arity(stmt.args().len())?;
        Ok(desc)
    }

    /// Runs one statement and reports any error it produced.
    pub fn dispatch(&mut self, stmt: &Statement) -> Outcome {
        let desc = match self.resolve(stmt) {
            Ok(desc) => desc,
            Err(err) => {
                self.session.report(&err);
                return Outcome::from_result(Err(err));
            }
        };
        trace!(command = desc.name, argv = ?stmt.argv, "dispatching");
        let previous = self.session.set_active(Some(desc.name));
        let outcome = Outcome::from_result((desc.handler)(self, stmt));
        if let Outcome::Recoverable(err) | Outcome::Fatal(err) = &outcome {
            self.session.report(err);
        }
        self.session.set_active(previous);
        outcome
    }

    /// Dispatches every complete statement held by `seg`.
    ///
    /// With `at_eof` the unterminated tail is run as a final statement.
    fn drain(&mut self, seg: &mut Segmenter, at_eof: bool) -> ControlFlow<RunStatus> {
        loop {
            let next = if at_eof {
                seg.finish(&self.session.env)
            } else {
                seg.next_statement(&self.session.env)
            };
            let outcome = match next {
                Ok(Some(stmt)) => self.dispatch(&stmt),
                Ok(None) => return ControlFlow::Continue(()),
                Err(err) => {
                    let err = ShellError::from(err);
                    self.session.report(&err);
                    Outcome::from_result(Err(err))
                }
            };
            match outcome {
                Outcome::Ok => {}
                Outcome::Terminate(code) => return ControlFlow::Break(RunStatus::Terminated(code)),
                Outcome::Recoverable(err) if self.session.options.continue_on_error() => {
                    debug!(%err, "continuing after error");
                }
                Outcome::Recoverable(err) | Outcome::Fatal(err) => {
                    return ControlFlow::Break(RunStatus::Stopped(err));
                }
            }
        }
    }

    fn stop(&mut self, err: ShellError) -> RunStatus {
        self.session.report(&err);
        RunStatus::Stopped(err)
    }

    /// Interprets everything `reader` produces, reading `chunk_size` bytes at a time.
    pub fn run_reader<R: Read>(&mut self, mut reader: R, chunk_size: usize) -> RunStatus {
        let mut seg = Segmenter::new(Mode::Chunk);
        let mut chunk = vec![0u8; chunk_size.max(1)];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return self.stop(ShellError::Input(err)),
            };
            if let Err(err) = seg.feed(&chunk[..n]) {
                return self.stop(err.into());
            }
            if let ControlFlow::Break(status) = self.drain(&mut seg, false) {
                return status;
            }
        }
        match self.drain(&mut seg, true) {
            ControlFlow::Break(status) => status,
            ControlFlow::Continue(()) => RunStatus::Completed,
        }
    }

    /// Runs a script file.
    ///
    /// Failing to open the file is returned, not reported.
    pub fn run_script(&mut self, path: &Path) -> Result<RunStatus, ShellError> {
        let file = File::open(path).map_err(|source| ShellError::File {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "running script");
        let status = self.run_reader(file, SCRIPT_CHUNK_SIZE);
        debug!(path = %path.display(), ?status, "script finished");
        Ok(status)
    }

    /// Interprets complete input given as a string, e.g. from the command line.
    ///
    /// Newlines end statements here, as do semicolons.
    pub fn run_str(&mut self, input: &str) -> RunStatus {
        let mut seg = Segmenter::new(Mode::Line);
        if let Err(err) = seg.feed(input.as_bytes()) {
            return self.stop(err.into());
        }
        match self.drain(&mut seg, true) {
            ControlFlow::Break(status) => status,
            ControlFlow::Continue(()) => RunStatus::Completed,
        }
    }

    /// Feeds one line typed at the REPL and runs the statements it completes.
    ///
    /// The line is fed with its newline, so a `#` comment ends with the line
    /// while a statement keeps going until its `;`. A trailing backslash is
    /// dropped.
    fn feed_line(&mut self, seg: &mut Segmenter, line: &str) -> ControlFlow<RunStatus> {
        let line = line.strip_suffix('\\').unwrap_or(line);
        for bytes in [line.as_bytes(), b"\n".as_slice()] {
            if let Err(err) = seg.feed(bytes) {
                seg.clear();
                return ControlFlow::Break(self.stop(err.into()));
            }
        }
        self.drain(seg, false)
    }

    /// Writes `history` to the history file configured right now.
    fn save_history<H: History>(&self, history: &mut H) {
        if let Some(path) = self.session.options.history_file() {
            if let Err(err) = history.save(&path) {
                warn!(path = %path.display(), %err, "cannot save history");
            }
        }
    }

    /// Interactive Read-Eval-Print Loop.
    ///
    /// Lines are collected until a statement is terminated. Errors never end
    /// the loop except fatal ones; they only discard the buffered input.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;
        if let Some(path) = self.session.options.history_file() {
            if let Err(err) = rl.load_history(&path) {
                debug!(path = %path.display(), %err, "no history loaded");
            }
        }

        self.session.notice(format_args!(
            "{PROGRAM} {VERSION} ({})\ntype `help;' for help, `quit;' to leave.",
            self.session.driver().version()
        ))?;

        let mut seg = Segmenter::new(Mode::Chunk);
        let code = loop {
            let prompt = if seg.in_statement() {
                CONTINUATION_PROMPT.to_string()
            } else {
                self.session.options.prompt().to_string()
            };
            self.session.flush()?;

            match rl.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    match self.feed_line(&mut seg, &line) {
                        ControlFlow::Continue(()) => {}
                        ControlFlow::Break(RunStatus::Terminated(code)) => break code,
                        ControlFlow::Break(RunStatus::Stopped(err)) if err.is_fatal() => break 1,
                        ControlFlow::Break(_) => seg.clear(),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    seg.clear();
                }
                Err(ReadlineError::Eof) => {
                    match self.drain(&mut seg, true) {
                        ControlFlow::Break(RunStatus::Terminated(code)) => break code,
                        ControlFlow::Break(RunStatus::Stopped(err)) if err.is_fatal() => break 1,
                        _ => {}
                    }
                    self.session.close_all()?;
                    self.session.notice("bye.")?;
                    break 0;
                }
                Err(err) => return Err(err.into()),
            }
        };

        self.save_history(rl.history_mut());
        self.session.flush()?;
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandDescriptor, Status};
    use crate::connection::tests::EchoDriver;
    use crate::env::Environment;
    use crate::io_adapters::{Console, MemWriter};
    use crate::options::ShellOption;
    use rustyline::history::FileHistory;
    use std::fs;
    use std::io::{Cursor, Write};

    fn record(interp: &mut Interpreter, stmt: &Statement) -> Result<Status, ShellError> {
        let line = stmt.argv.join(" ");
        writeln!(interp.session.out(), "{line}")?;
        Ok(Status::Continue)
    }

    fn fail(_: &mut Interpreter, _: &Statement) -> Result<Status, ShellError> {
        Err(ShellError::InvalidArgument("boom".into()))
    }

    fn explode(_: &mut Interpreter, _: &Statement) -> Result<Status, ShellError> {
        Err(ShellError::Fatal("explosion".into()))
    }

    fn leave(_: &mut Interpreter, stmt: &Statement) -> Result<Status, ShellError> {
        let code = stmt.args().first().and_then(|c| c.parse().ok()).unwrap_or(0);
        Ok(Status::Exit(code))
    }

    fn shell() -> (Interpreter, MemWriter, MemWriter) {
        let (console, out, err) = Console::captured();
        let session = Session::new(Box::new(EchoDriver), console).with_env(Environment::empty());
        let table = CommandTable::new(vec![
            CommandDescriptor::new("REC", 0, None, record),
            CommandDescriptor::new("PAIR", 2, Some(2), record),
            CommandDescriptor::new("FAIL", 0, None, fail),
            CommandDescriptor::new("EXPLODE", 0, None, explode),
            CommandDescriptor::new("LEAVE", 0, Some(1), leave),
            CommandDescriptor::new("SETENV", 0, Some(2), record),
        ])
        .unwrap();
        (Interpreter::new(session, table), out, err)
    }

    #[test]
    fn test_dispatch_is_case_insensitive() {
        let (mut sh, out, _) = shell();
        let status = sh.run_str("rec a; Rec b;");
        assert!(matches!(status, RunStatus::Completed));
        assert_eq!(out.contents(), "rec a\nRec b\n");
    }

    #[test]
    fn test_unknown_command() {
        let (mut sh, _, err) = shell();
        let status = sh.run_str("bogus 1;");
        assert!(matches!(
            status,
            RunStatus::Stopped(ShellError::UnknownCommand(_))
        ));
        assert_eq!(
            err.contents(),
            "dbshell: bogus: unknown command.\ntry `help;' for more information.\n"
        );
    }

    #[test]
    fn test_arity_errors() {
        let (mut sh, out, err) = shell();
        sh.session.options.set(ShellOption::Continue, Some("yes")).unwrap();
        sh.run_str("PAIR; PAIR a b c; PAIR a b;");
        assert_eq!(out.contents(), "PAIR a b\n");
        assert_eq!(
            err.contents(),
            "dbshell: PAIR: missing required arguments.\ntry `help pair;' for more information.\n\
             dbshell: PAIR: unknown arguments\ntry `help pair;' for more information.\n"
        );
    }

    #[test]
    fn test_assignment_goes_to_setenv() {
        let (mut sh, out, _) = shell();
        sh.run_str("FOO = bar;");
        assert_eq!(out.contents(), "FOO = bar\n");
    }

    #[test]
    fn test_continue_on_error_runs_remaining_statements() {
        let (mut sh, out, err) = shell();
        sh.session.options.set(ShellOption::Continue, Some("yes")).unwrap();
        let status = sh.run_str("REC one; FAIL; REC three;");
        assert!(matches!(status, RunStatus::Completed));
        assert_eq!(out.contents(), "REC one\nREC three\n");
        assert_eq!(err.contents(), "dbshell: FAIL: invalid argument \"boom\"\n");
    }

    #[test]
    fn test_without_continue_the_run_stops() {
        let (mut sh, out, _) = shell();
        let status = sh.run_str("REC one; FAIL; REC three;");
        assert!(matches!(status, RunStatus::Stopped(_)));
        assert_eq!(status.exit_code(), 1);
        assert_eq!(out.contents(), "REC one\n");
    }

    #[test]
    fn test_fatal_stops_even_with_continue() {
        let (mut sh, out, _) = shell();
        sh.session.options.set(ShellOption::Continue, Some("yes")).unwrap();
        let status = sh.run_str("EXPLODE; REC never;");
        assert!(matches!(status, RunStatus::Stopped(ShellError::Fatal(_))));
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn test_terminate_stops_with_code() {
        let (mut sh, out, _) = shell();
        let status = sh.run_str("LEAVE 3; REC never;");
        assert!(matches!(status, RunStatus::Terminated(3)));
        assert_eq!(status.exit_code(), 3);
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn test_syntax_error_is_recoverable() {
        let (mut sh, out, err) = shell();
        sh.session.options.set(ShellOption::Continue, Some("yes")).unwrap();
        let status = sh.run_str("REC ok;\nREC 'open");
        assert!(matches!(status, RunStatus::Completed));
        assert_eq!(out.contents(), "REC ok\n");
        assert_eq!(
            err.contents(),
            "dbshell: syntax error: unterminated single quote\n"
        );
    }

    #[test]
    fn test_active_command_restored() {
        let (mut sh, _, _) = shell();
        sh.run_str("REC x;");
        assert_eq!(sh.session.active_command(), None);
    }

    #[test]
    fn test_reader_chunk_sizes_agree() {
        let script = "REC 'a;b' c;\n# comment; here\nREC \"x\\\"y\" ${NONE}z;\nREC tail";
        let mut expected = None;
        for chunk in [1, 2, 3, 7, 4096] {
            let (mut sh, out, _) = shell();
            let status = sh.run_reader(Cursor::new(script), chunk);
            assert!(matches!(status, RunStatus::Completed));
            let got = out.contents();
            match &expected {
                None => expected = Some(got),
                Some(first) => assert_eq!(first, &got, "chunk size {chunk}"),
            }
        }
        assert_eq!(expected.unwrap(), "REC a;b c\nREC x\"y z\nREC tail\n");
    }

    #[test]
    fn test_missing_script_is_an_error() {
        let (mut sh, _, _) = shell();
        let err = sh.run_script(Path::new("/definitely/not/here.sql")).unwrap_err();
        assert!(matches!(err, ShellError::File { .. }));
    }

    fn type_lines(sh: &mut Interpreter, lines: &[&str]) -> Segmenter {
        let mut seg = Segmenter::new(Mode::Chunk);
        for line in lines {
            assert!(sh.feed_line(&mut seg, line).is_continue(), "line {line:?}");
        }
        seg
    }

    #[test]
    fn test_repl_comment_ends_with_its_line() {
        let (mut sh, out, _) = shell();
        let seg = type_lines(
            &mut sh,
            &["# note", "REC a;", "REC b; # trailing; note", "REC c;"],
        );
        assert_eq!(out.contents(), "REC a\nREC b\nREC c\n");
        assert!(!seg.in_statement());
    }

    #[test]
    fn test_repl_statement_spans_lines() {
        let (mut sh, out, _) = shell();
        let mut seg = type_lines(&mut sh, &["REC select *", "  from t -- x"]);
        assert_eq!(out.contents(), "");
        assert!(seg.in_statement());

        assert!(sh.feed_line(&mut seg, "where id = 1; REC next").is_continue());
        assert_eq!(out.contents(), "REC select * from t -- x where id = 1\n");
        assert!(seg.in_statement());
    }

    #[test]
    fn test_repl_backslash_continues_line() {
        let (mut sh, out, _) = shell();
        type_lines(&mut sh, &["REC a\\", "b;", "REC 'x\\", "y';"]);
        assert_eq!(out.contents(), "REC a b\nREC x\ny\n");
    }

    #[test]
    fn test_repl_eof_runs_pending_line() {
        let (mut sh, out, _) = shell();
        let mut seg = type_lines(&mut sh, &["REC one;", "REC two"]);
        assert_eq!(out.contents(), "REC one\n");
        assert!(sh.drain(&mut seg, true).is_continue());
        assert_eq!(out.contents(), "REC one\nREC two\n");
    }

    #[test]
    fn test_repl_error_stops_line() {
        let (mut sh, out, _) = shell();
        let mut seg = Segmenter::new(Mode::Chunk);
        let flow = sh.feed_line(&mut seg, "FAIL; REC skipped;");
        assert!(matches!(
            flow,
            ControlFlow::Break(RunStatus::Stopped(ShellError::InvalidArgument(_)))
        ));
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn test_history_follows_current_histfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        let (mut sh, _, _) = shell();
        let options = &mut sh.session.options;
        options.set(ShellOption::History, Some("yes")).unwrap();
        options
            .set(ShellOption::HistFile, path.to_str())
            .unwrap();

        let mut history = FileHistory::new();
        history.add("REC saved;").unwrap();
        sh.save_history(&mut history);
        assert!(fs::read_to_string(&path).unwrap().contains("REC saved;"));

        sh.session.options.set(ShellOption::History, Some("no")).unwrap();
        fs::remove_file(&path).unwrap();
        sh.save_history(&mut history);
        assert!(!path.exists());
    }
}
