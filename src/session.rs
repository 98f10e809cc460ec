//! Everything a running shell remembers between statements.

use crate::PROGRAM;
use crate::connection::{Connections, Driver, NamedConnection};
use crate::env::Environment;
use crate::error::ShellError;
use crate::io_adapters::Console;
use crate::options::Options;
use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

struct OutputFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Explicit context handed to every command handler.
///
/// Owns the option store, the variable environment, the open connections,
/// the console and the optional result file. Also tracks which command is
/// executing so diagnostics can name it.
pub struct Session {
    pub options: Options,
    pub env: Environment,
    pub connections: Connections,
    driver: Box<dyn Driver>,
    console: Console,
    output: Option<OutputFile>,
    active: Option<&'static str>,
    script_depth: usize,
}

impl Session {
    /// A session with default options and a snapshot of the process environment.
    pub fn new(driver: Box<dyn Driver>, console: Console) -> Self {
        Self {
            options: Options::default(),
            env: Environment::new(),
            connections: Connections::new(),
            driver,
            console,
            output: None,
            active: None,
            script_depth: 0,
        }
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// The console's standard output.
    pub fn out(&mut self) -> &mut dyn Write {
        self.console.out.as_mut()
    }

    /// Where result sets go: the file opened with `OPEN`, or the console.
    pub fn results(&mut self) -> &mut dyn Write {
        match &mut self.output {
            Some(file) => &mut file.writer,
            None => self.console.out.as_mut(),
        }
    }

    /// Prints an informational line unless the shell is silent.
    pub fn notice(&mut self, msg: impl Display) -> io::Result<()> {
        if self.options.silent() {
            return Ok(());
        }
        writeln!(self.console.out, "{msg}")
    }

    /// Prints a progress line when the shell is verbose.
    pub fn verbose(&mut self, msg: impl Display) -> io::Result<()> {
        if !self.options.verbose() {
            return Ok(());
        }
        writeln!(self.console.out, "{msg}")
    }

    /// Writes a diagnostic to the console's standard error.
    ///
    /// Non-fatal errors are suppressed in silent mode.
    pub fn report(&mut self, err: &ShellError) {
        if self.options.silent() && !err.is_fatal() {
            return;
        }
        let prefix = match self.active {
            Some(cmd) if err.help_topic().is_none() => format!("{PROGRAM}: {cmd}: "),
            _ => format!("{PROGRAM}: "),
        };
        let _ = writeln!(self.console.err, "{prefix}{err}");
        match err.help_topic() {
            Some("") => {
                let _ = writeln!(self.console.err, "try `help;' for more information.");
            }
            Some(topic) => {
                let _ = writeln!(
                    self.console.err,
                    "try `help {};' for more information.",
                    topic.to_lowercase()
                );
            }
            None => {}
        }
        let _ = self.console.err.flush();
    }

    pub fn active_command(&self) -> Option<&'static str> {
        self.active
    }

    /// Records the executing command, returning the previous one.
    pub fn set_active(&mut self, cmd: Option<&'static str>) -> Option<&'static str> {
        std::mem::replace(&mut self.active, cmd)
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_ref().map(|file| file.path.as_path())
    }

    /// Sends result sets to `path`, replacing any file opened before.
    pub fn open_output(&mut self, path: &Path) -> Result<(), ShellError> {
        self.close_output()?;
        let file = File::create(path).map_err(|source| ShellError::File {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "writing results to file");
        self.output = Some(OutputFile {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        });
        Ok(())
    }

    /// Sends result sets back to the console. Returns the closed file, if any.
    pub fn close_output(&mut self) -> Result<Option<PathBuf>, ShellError> {
        let Some(mut file) = self.output.take() else {
            return Ok(None);
        };
        file.writer.flush().map_err(|source| ShellError::File {
            path: file.path.clone(),
            source,
        })?;
        Ok(Some(file.path))
    }

    /// Opens a connection through the driver and makes it current.
    pub fn connect(&mut self, name: &str, dsn: &str) -> Result<(), ShellError> {
        if self.connections.contains(name) {
            return Err(ShellError::DuplicateConnection(name.to_string()));
        }
        debug!(name, dsn, driver = self.driver.name(), "connecting");
        let handle = self.driver.connect(dsn).map_err(ShellError::Driver)?;
        self.connections.add(NamedConnection {
            name: name.to_string(),
            dsn: dsn.to_string(),
            handle,
        })?;
        Ok(())
    }

    /// Closes every connection, announcing each one.
    pub fn close_all(&mut self) -> io::Result<()> {
        for conn in self.connections.drain() {
            debug!(name = %conn.name, "closing connection");
            self.verbose(format_args!("closing connection \"{}\"", conn.name))?;
        }
        Ok(())
    }

    pub(crate) fn enter_script(&mut self, limit: usize) -> Result<(), ShellError> {
        if self.script_depth >= limit {
            warn!(limit, "script nesting limit reached");
            return Err(ShellError::NestingTooDeep(limit));
        }
        self.script_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_script(&mut self) {
        self.script_depth = self.script_depth.saturating_sub(1);
    }

    /// Flushes the console and any result file.
    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = &mut self.output {
            file.writer.flush()?;
        }
        self.console.out.flush()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
