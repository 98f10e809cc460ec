//! An interactive shell for SQL databases.
//!
//! Input is split into statements at unquoted `;` (and at newlines when read
//! a line at a time), each statement is split into whitespace-separated
//! arguments with quoting, escapes and `${NAME}` substitution, and the first
//! argument picks a command from a case-insensitive table. SQL keywords are
//! commands too: they forward the statement text to the current connection.
//!
//! The main entry point is [`Interpreter`]. It owns a [`Session`] holding the
//! options, variables, connections and output sinks that commands act on.
//! [`Segmenter`] and the [`tokenizer`] functions can be used on their own to
//! split statement streams that arrive in arbitrary chunks.

mod builtin;
pub mod command;
pub mod connection;
pub mod env;
pub mod error;
mod interpreter;
mod io_adapters;
pub mod options;
pub mod profile;
mod render;
mod segmenter;
mod session;
mod sqlite;
pub mod tokenizer;

/// Name used in diagnostics and the banner.
pub const PROGRAM: &str = "dbshell";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::ShellError;
pub use interpreter::{Interpreter, MAX_SCRIPT_DEPTH, RunStatus, SCRIPT_CHUNK_SIZE};
pub use io_adapters::{Console, MemWriter};
pub use segmenter::Segmenter;
pub use session::Session;
pub use sqlite::{SqliteConnection, SqliteDriver};
pub use tokenizer::{Mode, Statement};
