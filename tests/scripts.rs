use dbshell::options::ShellOption;
use dbshell::profile;
use dbshell::{Console, Interpreter, MemWriter, RunStatus, Session, ShellError, SqliteDriver};
use std::fs;
use std::io::Cursor;

fn shell() -> (Interpreter, MemWriter, MemWriter) {
    let (console, out, err) = Console::captured();
    let session = Session::new(Box::new(SqliteDriver), console);
    (Interpreter::with_builtins(session).unwrap(), out, err)
}

const SETUP: &str = "connect :memory:;\n\
create table users (\n\
    id integer primary key,\n\
    name text\n\
);\n\
insert into users (id, name) values (1, 'Ann'), (2, NULL);\n";

#[test]
fn test_sql_round_trip() {
    let (mut sh, out, err) = shell();
    let status = sh.run_reader(Cursor::new(SETUP), 8);
    assert!(matches!(status, RunStatus::Completed), "{}", err.contents());

    sh.run_str("select id, name from users order by id;");
    assert_eq!(
        out.contents(),
        "using connection \"default\"\n\
         Statement executed. 0 rows affected.\n\
         Statement executed. 2 rows affected.\n\
         \"id\",\"name\"\n\"1\",\"Ann\"\n\"2\",\"\"\n\
         2 rows in set.\n"
    );
}

#[test]
fn test_fixed_format_and_maxrows() {
    let (mut sh, out, _) = shell();
    sh.run_reader(Cursor::new(SETUP), 4096);
    sh.run_str("set format fixed; set maxrows 1; select name from users order by id;");
    assert!(out.contents().ends_with(
        "+------+\n\
         | name |\n\
         +------+\n\
         | Ann  |\n\
         +------+\n\
         1 of 2 rows in set.\n"
    ));
}

#[test]
fn test_continue_on_error_with_database() {
    let (mut sh, out, err) = shell();
    sh.session_mut()
        .options
        .set(ShellOption::Continue, Some("yes"))
        .unwrap();
    let status = sh.run_str("connect :memory:; select 1 as one; selekt 2; select 3 as three;");
    assert!(matches!(status, RunStatus::Completed));
    assert!(out.contents().contains("\"one\"\n\"1\"\n"));
    assert!(out.contents().contains("\"three\"\n\"3\"\n"));
    assert!(err.contents().starts_with("dbshell: selekt: unknown command."));

    let (mut sh, out, _) = shell();
    let status = sh.run_str("connect :memory:; select 1 as one; selekt 2; select 3 as three;");
    assert!(matches!(status, RunStatus::Stopped(ShellError::UnknownCommand(_))));
    assert!(!out.contents().contains("three"));
}

#[test]
fn test_sql_errors_name_the_command() {
    let (mut sh, _, err) = shell();
    sh.run_str("connect :memory:; select * from missing;");
    assert!(
        err.contents().starts_with("dbshell: SELECT: no such table: missing"),
        "{}",
        err.contents()
    );
}

#[test]
fn test_show_tables() {
    let (mut sh, out, _) = shell();
    sh.run_reader(Cursor::new(SETUP), 4096);
    sh.run_str("show tables;");
    assert!(out
        .contents()
        .ends_with("\"TABLE_NAME\",\"TABLE_TYPE\"\n\"users\",\"TABLE\"\n1 row in set.\n"));
}

#[test]
fn test_source_and_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let setup = dir.path().join("setup.sql");
    let results = dir.path().join("results.csv");
    fs::write(&setup, SETUP).unwrap();

    let (mut sh, out, err) = shell();
    let status = sh.run_str(&format!(
        "source '{}';\nopen '{}';\nselect count(*) as n from users;\nclose;",
        setup.display(),
        results.display()
    ));
    assert!(matches!(status, RunStatus::Completed), "{}", err.contents());
    assert_eq!(fs::read_to_string(&results).unwrap(), "\"n\"\n\"2\"\n");
    assert!(out.contents().ends_with("1 row in set.\n"));
}

#[test]
fn test_missing_source_file() {
    let (mut sh, _, err) = shell();
    let status = sh.run_str("source /no/such/script.sql;");
    assert!(matches!(status, RunStatus::Stopped(ShellError::File { .. })));
    assert!(err.contents().starts_with("dbshell: SOURCE: /no/such/script.sql: "));
}

#[test]
fn test_quit_inside_script_ends_everything() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("quit.sql");
    fs::write(&script, "echo first;\nquit;\necho never;\n").unwrap();

    let (mut sh, out, _) = shell();
    let status = sh.run_str(&format!("source '{}'; echo after;", script.display()));
    assert!(matches!(status, RunStatus::Terminated(0)));
    assert_eq!(out.contents(), "first\nbye.\n");
}

#[test]
fn test_startup_script_sets_options() {
    let dir = tempfile::tempdir().unwrap();
    let conf = dir.path().join("conf.sql");
    fs::write(&conf, "# start-up\nset prompt 'sql> ';\nset format fixed;\n").unwrap();

    let (mut sh, _, _) = shell();
    let scripts = profile::startup_scripts(Some(conf), None, dir.path());
    let status = profile::run_startup(&mut sh, &scripts).unwrap();
    assert!(matches!(status, RunStatus::Completed));
    assert_eq!(sh.session().options.prompt(), "sql> ");
    assert_eq!(sh.session().options.format().to_string(), "fixed");
}

#[test]
fn test_quiet_hides_notices() {
    let (mut sh, out, err) = shell();
    sh.run_str("set silent yes; connect :memory:; select 1 as x; bogus;");
    assert_eq!(out.contents(), "\"x\"\n\"1\"\n");
    assert_eq!(err.contents(), "");
}
