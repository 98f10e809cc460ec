//! Error types shared by the tokenizer, the dispatcher and the built-in commands.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Which quote character opened a span that was never closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteKind {
    Single,
    Double,
}

impl std::fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteKind::Single => f.write_str("single"),
            QuoteKind::Double => f.write_str("double"),
        }
    }
}

/// Errors produced while splitting input into statements.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    /// A quote was opened and the input ended before it was closed.
    #[error("unterminated {0} quote")]
    UnterminatedQuote(QuoteKind),
    /// Growing the input buffer, a token or the argument vector failed.
    #[error("out of memory while reading input")]
    OutOfMemory,
}

/// Everything that can go wrong while interpreting a statement.
///
/// Only [`ShellError::OutOfMemory`] and [`ShellError::Fatal`] stop the shell
/// unconditionally; every other variant is recoverable and the
/// continue-on-error option decides what happens next.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("syntax error: {0}")]
    Syntax(TokenizeError),

    #[error("{0}: unknown command.")]
    UnknownCommand(String),

    #[error("{0}: missing required arguments.")]
    MissingArguments(String),

    #[error("{0}: unknown arguments")]
    TooManyArguments(String),

    #[error("command \"{0}\" is registered more than once")]
    DuplicateCommand(String),

    #[error("unknown option \"{0}\"")]
    UnknownOption(String),

    #[error("invalid value \"{value}\" for option \"{option}\"")]
    InvalidValue { option: String, value: String },

    #[error("invalid variable name \"{0}\"")]
    InvalidVariable(String),

    #[error("invalid argument \"{0}\"")]
    InvalidArgument(String),

    #[error("not connected")]
    NotConnected,

    #[error("connection with name \"{0}\" already exists")]
    DuplicateConnection(String),

    #[error("no connection with name \"{0}\"")]
    UnknownConnection(String),

    #[error("{0:#}")]
    Driver(anyhow::Error),

    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: stopped after an error", .0.display())]
    ScriptFailed(PathBuf),

    #[error("scripts nested too deeply (limit is {0})")]
    NestingTooDeep(usize),

    #[error("input error: {0}")]
    Input(#[source] io::Error),

    #[error("output error: {0}")]
    Output(#[from] io::Error),

    #[error("out of memory")]
    OutOfMemory,

    #[error("{0}")]
    Fatal(String),
}

impl ShellError {
    /// Fatal errors end the run regardless of continue-on-error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::OutOfMemory | ShellError::Fatal(_))
    }

    /// The help topic to point the user at, if any.
    ///
    /// `Some("")` means the general help listing.
    pub fn help_topic(&self) -> Option<&str> {
        match self {
            ShellError::UnknownCommand(_) => Some(""),
            ShellError::MissingArguments(name) | ShellError::TooManyArguments(name) => {
                Some(name.as_str())
            }
            _ => None,
        }
    }
}

impl From<TokenizeError> for ShellError {
    fn from(err: TokenizeError) -> Self {
        match err {
            TokenizeError::OutOfMemory => ShellError::OutOfMemory,
            other => ShellError::Syntax(other),
        }
    }
}
