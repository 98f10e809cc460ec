//! Commands known to the shell at compile time.
//!
//! Every handler receives the statement with its arity already checked
//! against the descriptor. Arity counts the arguments after the command name.

use crate::command::{CommandDescriptor, CommandTable, Status};
use crate::connection::{Catalog, DEFAULT_CONNECTION, Execution, ResultSet};
use crate::env::is_valid_name;
use crate::error::ShellError;
use crate::interpreter::{Interpreter, MAX_SCRIPT_DEPTH, RunStatus};
use crate::options::ShellOption;
use crate::render;
use crate::session::Session;
use crate::tokenizer::Statement;
use crate::{PROGRAM, VERSION};
use std::path::{Path, PathBuf};
use tracing::debug;

type HandlerResult = Result<Status, ShellError>;

const HELP_COLUMNS: usize = 5;

macro_rules! sql_command {
    ($name:literal, $usage:literal) => {
        CommandDescriptor::new($name, 0, None, sql)
            .describe("Send the statement to the current connection.")
            .usage(&[$usage])
    };
}

const COMMANDS: &[CommandDescriptor] = &[
    sql_command!("ALTER", "alter table t add column c integer"),
    sql_command!("BEGIN", "begin transaction"),
    CommandDescriptor::new("CLEAR", 0, Some(0), clear)
        .describe("Clear the terminal screen.")
        .usage(&["clear"]),
    CommandDescriptor::new("CLOSE", 0, Some(0), close)
        .describe("Stop writing results to the file opened with OPEN.")
        .usage(&["close"]),
    sql_command!("COMMIT", "commit"),
    CommandDescriptor::new("CONNECT", 1, Some(2), connect)
        .describe(
            "Open a connection to a data source and make it current. \
             Without a name the connection is called \"default\".",
        )
        .usage(&["connect \"DSN=app.db\"", "connect reports /var/db/reports.db"]),
    sql_command!("CREATE", "create table t (id integer primary key, name text)"),
    sql_command!("DELETE", "delete from t where id = 1"),
    CommandDescriptor::new("DISCONNECT", 0, Some(1), disconnect)
        .describe("Close the current connection, or the named one.")
        .usage(&["disconnect", "disconnect reports"]),
    sql_command!("DROP", "drop table t"),
    CommandDescriptor::new("ECHO", 0, None, echo)
        .describe("Print each argument on its own line.")
        .usage(&["echo \"home is ${HOME}\""]),
    CommandDescriptor::new("EXIT", 0, Some(0), quit)
        .describe("Close all connections and leave the shell.")
        .usage(&["exit"]),
    sql_command!("GRANT", "grant select on t to someone"),
    CommandDescriptor::new("HELP", 0, Some(1), help)
        .describe("List the available commands, or describe one of them.")
        .usage(&["help", "help connect"]),
    sql_command!("INSERT", "insert into t values (1, 'one')"),
    CommandDescriptor::new("LOGOUT", 0, Some(0), quit)
        .describe("Close all connections and leave the shell.")
        .usage(&["logout"]),
    sql_command!("MERGE", "merge into t using s on t.id = s.id when matched then delete"),
    CommandDescriptor::new("OPEN", 0, Some(1), open)
        .describe("Write results to a file instead of the screen, or show where they go.")
        .usage(&["open results.csv", "open"]),
    CommandDescriptor::new("QUIT", 0, Some(0), quit)
        .describe("Close all connections and leave the shell.")
        .usage(&["quit"]),
    CommandDescriptor::new("RECONNECT", 0, Some(1), reconnect)
        .describe("Reopen the current connection, or the named one.")
        .usage(&["reconnect", "reconnect reports"]),
    CommandDescriptor::new("RESET", 0, Some(0), reset)
        .describe("Close all connections and restore every option to its default.")
        .usage(&["reset"]),
    sql_command!("REVOKE", "revoke select on t from someone"),
    sql_command!("ROLLBACK", "rollback"),
    sql_command!("SAVE", "save transaction sp1"),
    sql_command!("SAVEPOINT", "savepoint sp1"),
    sql_command!("SELECT", "select * from t"),
    CommandDescriptor::new("SEND", 1, None, send)
        .describe("Send the rest of the statement to the current connection as it is.")
        .usage(&["send pragma table_info(t)"]),
    CommandDescriptor::new("SET", 0, Some(2), set)
        .describe(
            "List the options, show one option or change it. \
             `set help' describes the options.",
        )
        .usage(&["set", "set prompt", "set prompt \"db> \"", "set help verbose"]),
    CommandDescriptor::new("SETENV", 0, Some(2), setenv)
        .describe(
            "List the variables, show one variable or set it. \
             `NAME = value' is a short form.",
        )
        .usage(&["setenv", "setenv TABLE", "setenv TABLE users", "TABLE = users"]),
    CommandDescriptor::new("SHOW", 1, Some(1), show)
        .describe(
            "Show catalog information: datatypes, dsn, owners, qualifiers, tables or types.",
        )
        .usage(&["show tables", "show dsn"]),
    CommandDescriptor::new("SOURCE", 1, Some(1), source)
        .describe("Run the statements of a script file.")
        .usage(&["source setup.sql"]),
    sql_command!("START", "start transaction"),
    sql_command!("TRUNCATE", "truncate table t"),
    CommandDescriptor::new("UNSET", 1, Some(1), unset)
        .describe("Restore an option to its default value.")
        .usage(&["unset prompt"]),
    CommandDescriptor::new("UNSETENV", 0, Some(1), unsetenv)
        .describe("Remove a variable, or list them all.")
        .usage(&["unsetenv TABLE"]),
    sql_command!("UPDATE", "update t set name = 'uno' where id = 1"),
    CommandDescriptor::new("USE", 0, Some(1), use_connection)
        .describe("List the open connections, or make the named one current.")
        .usage(&["use", "use reports"]),
    CommandDescriptor::new("VERSION", 0, Some(0), version)
        .describe("Show version information of the shell, the driver and the connections.")
        .usage(&["version"]),
];

/// The table of every built-in command.
pub fn command_table() -> Result<CommandTable, ShellError> {
    CommandTable::new(COMMANDS.to_vec())
}

fn arg(stmt: &Statement, idx: usize) -> Result<&str, ShellError> {
    stmt.args()
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| ShellError::MissingArguments(stmt.name().to_uppercase()))
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Writes a result set to the result sink, followed by a row count notice.
fn show_result(session: &mut Session, result: &ResultSet) -> Result<(), ShellError> {
    let format = session.options.format();
    let limit = session.options.max_rows();
    let shown = render::write_result(session.results(), result, format, limit)?;
    session.results().flush()?;
    if shown < result.rows.len() {
        session.notice(format_args!(
            "{} of {} in set.",
            shown,
            plural(result.rows.len(), "row")
        ))?;
    } else {
        session.notice(format_args!("{} in set.", plural(shown, "row")))?;
    }
    Ok(())
}

fn run_sql(session: &mut Session, sql: &str) -> HandlerResult {
    let conn = session.connections.current_mut()?;
    debug!(connection = %conn.name, sql, "executing statement");
    let execution = conn.handle.execute(sql).map_err(ShellError::Driver)?;
    match execution {
        Execution::Rows(result) => show_result(session, &result)?,
        Execution::Affected(n) => session.notice(format_args!(
            "Statement executed. {} affected.",
            plural(n as usize, "row")
        ))?,
    }
    Ok(Status::Continue)
}

fn sql(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    run_sql(&mut interp.session, &stmt.text)
}

fn send(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let sql = stmt.text_after_name();
    if sql.is_empty() {
        return Err(ShellError::MissingArguments("SEND".to_string()));
    }
    run_sql(&mut interp.session, sql)
}

fn clear(interp: &mut Interpreter, _stmt: &Statement) -> HandlerResult {
    write!(interp.session.out(), "\x1b[2J\x1b[1;1H")?;
    Ok(Status::Continue)
}

fn connect(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let (name, dsn) = match stmt.args() {
        [dsn] => (DEFAULT_CONNECTION, dsn.as_str()),
        [name, dsn, ..] => (name.as_str(), dsn.as_str()),
        [] => return Err(ShellError::MissingArguments("CONNECT".to_string())),
    };
    let session = &mut interp.session;
    session.verbose(format_args!("connecting to \"{dsn}\""))?;
    session.connect(name, dsn)?;
    session.notice(format_args!("using connection \"{name}\""))?;
    Ok(Status::Continue)
}

fn disconnect(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    let closed = session
        .connections
        .remove(stmt.args().first().map(String::as_str))?;
    debug!(name = %closed.name, "connection closed");
    session.verbose(format_args!("closing connection \"{}\"", closed.name))?;
    drop(closed);
    if let Some(current) = session.connections.current() {
        let name = current.name.clone();
        session.notice(format_args!("using connection \"{name}\""))?;
    }
    Ok(Status::Continue)
}

fn reconnect(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    let conn = session
        .connections
        .get_mut(stmt.args().first().map(String::as_str))?;
    conn.handle.reconnect().map_err(ShellError::Driver)?;
    let name = conn.name.clone();
    session.verbose(format_args!("reconnected \"{name}\""))?;
    Ok(Status::Continue)
}

fn use_connection(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    if let Some(name) = stmt.args().first() {
        let name = session.connections.switch(name)?.name.clone();
        session.notice(format_args!("using connection \"{name}\""))?;
        return Ok(Status::Continue);
    }
    if session.connections.is_empty() {
        session.notice("no open connections.")?;
        return Ok(Status::Continue);
    }
    let lines: Vec<String> = session
        .connections
        .iter()
        .map(|(current, conn)| {
            let mark = if current { '*' } else { ' ' };
            format!("{mark} {:<15} {}", conn.name, conn.dsn)
        })
        .collect();
    let out = session.out();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(Status::Continue)
}

fn echo(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let out = interp.session.out();
    if stmt.args().is_empty() {
        writeln!(out)?;
    }
    for arg in stmt.args() {
        writeln!(out, "{arg}")?;
    }
    Ok(Status::Continue)
}

fn help(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let Some(topic) = stmt.args().first() else {
        let names: Vec<String> = interp
            .commands()
            .iter()
            .map(|desc| desc.name.to_lowercase())
            .collect();
        let out = interp.session.out();
        writeln!(out, "Available commands:")?;
        for row in names.chunks(HELP_COLUMNS) {
            let line: String = row.iter().map(|name| format!("{name:<12}")).collect();
            writeln!(out, "   {}", line.trim_end())?;
        }
        writeln!(out, "type `help COMMAND;' for more information on a command.")?;
        return Ok(Status::Continue);
    };

    let desc = *interp
        .commands()
        .lookup(topic)
        .ok_or_else(|| ShellError::UnknownCommand(topic.clone()))?;
    let out = interp.session.out();
    if let Some(description) = desc.description {
        writeln!(out, "{} Description:\n   {description}\n", desc.name)?;
    }
    if !desc.usage.is_empty() {
        writeln!(out, "{} Usage:", desc.name)?;
        for example in desc.usage {
            writeln!(out, "   {PROGRAM}> {example};")?;
        }
    }
    Ok(Status::Continue)
}

fn open(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    match stmt.args().first() {
        Some(path) => {
            session.open_output(Path::new(path))?;
            session.verbose(format_args!("writing results to \"{path}\""))?;
        }
        None => {
            let target = session
                .output_path()
                .map(|p| format!("\"{}\"", p.display()))
                .unwrap_or_else(|| "the console".to_string());
            session.notice(format_args!("results are written to {target}"))?;
        }
    }
    Ok(Status::Continue)
}

fn close(interp: &mut Interpreter, _stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    match session.close_output()? {
        Some(path) => session.verbose(format_args!("closed \"{}\"", path.display()))?,
        None => session.notice("no output file is open.")?,
    }
    Ok(Status::Continue)
}

fn quit(interp: &mut Interpreter, _stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    session.close_all()?;
    session.close_output()?;
    session.notice("bye.")?;
    Ok(Status::Exit(0))
}

fn reset(interp: &mut Interpreter, _stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    session.close_all()?;
    session.close_output()?;
    session.options.reset_all();
    session.verbose("all options reset.")?;
    Ok(Status::Continue)
}

fn option(name: &str) -> Result<ShellOption, ShellError> {
    ShellOption::from_name(name).ok_or_else(|| ShellError::UnknownOption(name.to_string()))
}

fn set(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    match stmt.args() {
        [] => {
            let lines: Vec<String> = ShellOption::ALL
                .iter()
                .map(|&opt| session.options.show(opt))
                .collect();
            let out = session.out();
            for line in lines {
                writeln!(out, "{line}")?;
            }
        }
        [first, rest @ ..] if first.eq_ignore_ascii_case("help") => {
            let opts = match rest.first() {
                Some(name) => vec![option(name)?],
                None => ShellOption::ALL.to_vec(),
            };
            let out = session.out();
            for opt in opts {
                writeln!(out, "{:<15} {}", opt.name(), opt.description())?;
            }
        }
        [name] => {
            let line = session.options.show(option(name)?);
            writeln!(session.out(), "{line}")?;
        }
        [name, value, ..] => {
            let opt = option(name)?;
            session.options.set(opt, Some(value.as_str()))?;
            debug!(option = opt.name(), value = %value, "option set");
        }
    }
    Ok(Status::Continue)
}

fn unset(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let opt = option(arg(stmt, 0)?)?;
    interp.session.options.set(opt, None)?;
    Ok(Status::Continue)
}

fn list_variables(session: &mut Session) -> HandlerResult {
    let lines: Vec<String> = session
        .env
        .sorted()
        .into_iter()
        .map(|(name, value)| format!("   {name:<20} {value}"))
        .collect();
    let out = session.out();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(Status::Continue)
}

fn assign_variable(session: &mut Session, name: &str, value: &str) -> HandlerResult {
    if !is_valid_name(name) {
        return Err(ShellError::InvalidVariable(name.to_string()));
    }
    debug!(name, "variable set");
    session.env.set_var(name, value);
    Ok(Status::Continue)
}

fn setenv(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    if !stmt.name().eq_ignore_ascii_case("setenv") {
        // NAME = [value]
        let value = stmt.args().get(1).map(String::as_str).unwrap_or("");
        return assign_variable(session, stmt.name(), value);
    }
    match stmt.args() {
        [] => list_variables(session),
        [name] => {
            let value = session.env.get_var(name).unwrap_or_default();
            writeln!(session.out(), "   {name:<20} {value}")?;
            Ok(Status::Continue)
        }
        [name, value, ..] => assign_variable(session, name, value),
    }
}

fn unsetenv(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    match stmt.args().first() {
        None => list_variables(session),
        Some(name) => {
            session.env.remove_var(name);
            Ok(Status::Continue)
        }
    }
}

fn show(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let what = arg(stmt, 0)?;
    let session = &mut interp.session;
    let result = if what.eq_ignore_ascii_case("dsn") {
        let mut result = ResultSet::new(vec!["DSN".to_string(), "DESCRIPTION".to_string()]);
        result.rows = session
            .driver()
            .data_sources()
            .into_iter()
            .map(|ds| vec![Some(ds.name), Some(ds.description)])
            .collect();
        result
    } else {
        let kind =
            Catalog::from_name(what).ok_or_else(|| ShellError::InvalidArgument(what.to_string()))?;
        session
            .connections
            .current_mut()?
            .handle
            .catalog(kind)
            .map_err(ShellError::Driver)?
    };
    show_result(session, &result)?;
    Ok(Status::Continue)
}

fn source(interp: &mut Interpreter, stmt: &Statement) -> HandlerResult {
    let path = PathBuf::from(arg(stmt, 0)?);
    interp.session.enter_script(MAX_SCRIPT_DEPTH)?;
    let status = interp.run_script(&path);
    interp.session.leave_script();
    match status? {
        RunStatus::Completed => Ok(Status::Continue),
        RunStatus::Terminated(code) => Ok(Status::Exit(code)),
        RunStatus::Stopped(err) if err.is_fatal() => Err(ShellError::Fatal(format!(
            "{}: stopped after a fatal error",
            path.display()
        ))),
        RunStatus::Stopped(_) => Err(ShellError::ScriptFailed(path)),
    }
}

fn version(interp: &mut Interpreter, _stmt: &Statement) -> HandlerResult {
    let session = &mut interp.session;
    let mut lines = vec![
        format!("{PROGRAM} {VERSION}"),
        format!(
            "driver: {} ({})",
            session.driver().name(),
            session.driver().version()
        ),
    ];
    lines.extend(
        session
            .connections
            .iter()
            .map(|(_, conn)| format!("{}: {}", conn.name, conn.handle.describe())),
    );
    let out = session.out();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(Status::Continue)
}
