//! Splits raw input into statements and statements into argument tokens.
//!
//! A statement ends at an unquoted `;` or NUL byte, and in [`Mode::Line`]
//! also at a newline. Within a statement:
//!
//! - spaces, tabs and carriage returns separate tokens (so do newlines in
//!   [`Mode::Chunk`]);
//! - `#` starts a comment running to the end of the line;
//! - `'...'` is taken verbatim;
//! - `"..."` and bare words go through [`expand`], which resolves `\x`
//!   escapes and `${NAME}` substitutions;
//! - `=` is always a token on its own;
//! - a backslash before a newline continues the statement on the next line.
//!
//! The scanner never guesses: when the input ends inside a quote, a comment,
//! after a backslash or before a terminator, it reports [`Scan::Incomplete`]
//! unless told that no more input will arrive.

use crate::env::Variables;
use crate::error::{QuoteKind, TokenizeError};
use std::mem;

/// Which bytes terminate a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Input arrives as whole lines; a newline ends a statement as well.
    Line,
    /// Input arrives as arbitrary chunks; only `;` and NUL end a statement.
    Chunk,
}

/// One tokenized statement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statement {
    /// Expanded argument tokens. `argv[0]` is the command name.
    pub argv: Vec<String>,
    /// Source text from the first token up to the terminator, trimmed.
    pub text: String,
}

impl Statement {
    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    /// Arguments after the command name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// Source text following the command name, e.g. the SQL of `SEND ...`.
    pub fn text_after_name(&self) -> &str {
        self.text
            .trim_start()
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or("")
    }
}

/// Result of scanning the start of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// A statement was terminated after `consumed` bytes (terminator included).
    ///
    /// The statement may be empty, e.g. for `;;` or a comment-only line.
    Complete { statement: Statement, consumed: usize },
    /// The buffer holds the beginning of a statement only.
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TokenizingState {
    #[default]
    Between,
    Comment,
    Bare,
    SingleQuote,
    DoubleQuote,
}

enum Step {
    Next,
    Terminated(usize),
    NeedMore,
}

/// Where an unfinished scan stopped, so the next call picks up from there
/// instead of reading the pending bytes again.
///
/// Offsets are relative to the start of the pending input.
#[derive(Debug, Default)]
pub(crate) struct ScanState {
    pos: usize,
    state: TokenizingState,
    token_start: usize,
    first_token: Option<usize>,
    argv: Vec<String>,
}

impl ScanState {
    /// No token has started and no quote or comment is open.
    pub(crate) fn is_blank(&self) -> bool {
        self.first_token.is_none() && self.state == TokenizingState::Between
    }

    #[cfg(test)]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }
}

struct TokenizingFSM<'a> {
    input: &'a [u8],
    pos: usize,
    mode: Mode,
    at_eof: bool,
    state: TokenizingState,
    token_start: usize,
    first_token: Option<usize>,
    argv: Vec<String>,
    vars: &'a dyn Variables,
}

impl<'a> TokenizingFSM<'a> {
    fn new(
        input: &'a [u8],
        mode: Mode,
        at_eof: bool,
        vars: &'a dyn Variables,
        saved: ScanState,
    ) -> Self {
        let ScanState {
            pos,
            state,
            token_start,
            first_token,
            argv,
        } = saved;
        TokenizingFSM {
            input,
            pos,
            mode,
            at_eof,
            state,
            token_start,
            first_token,
            argv,
            vars,
        }
    }

    fn suspend(self) -> ScanState {
        ScanState {
            pos: self.pos,
            state: self.state,
            token_start: self.token_start,
            first_token: self.first_token,
            argv: self.argv,
        }
    }

    fn run(&mut self) -> Result<Scan, TokenizeError> {
        while let Some(byte) = self.read_byte() {
            let step = match self.state {
                TokenizingState::Between => self.handle_between(byte)?,
                TokenizingState::Comment => self.handle_comment(byte),
                TokenizingState::Bare => self.handle_bare(byte)?,
                TokenizingState::SingleQuote => self.handle_single_quote(byte)?,
                TokenizingState::DoubleQuote => self.handle_double_quote(byte)?,
            };
            match step {
                Step::Next => {}
                Step::Terminated(end) => {
                    let consumed = self.pos;
                    return Ok(self.complete(end, consumed));
                }
                Step::NeedMore => return Ok(Scan::Incomplete),
            }
        }
        self.end_of_input()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.input.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn is_terminator(&self, byte: u8) -> bool {
        matches!(byte, b';' | 0) || (byte == b'\n' && self.mode == Mode::Line)
    }

    /// Where a token starting at the byte just read begins.
    fn begin_token(&mut self, start: usize, state: TokenizingState) {
        self.first_token.get_or_insert(start);
        self.token_start = start;
        self.state = state;
    }

    fn handle_between(&mut self, byte: u8) -> Result<Step, TokenizeError> {
        let at = self.pos - 1;
        match byte {
            b if self.is_terminator(b) => return Ok(Step::Terminated(at)),
            b' ' | b'\t' | b'\r' | b'\n' => {}
            b'#' => self.state = TokenizingState::Comment,
            b'=' => {
                self.first_token.get_or_insert(at);
                self.push_arg(String::from("="))?;
            }
            b'\'' => {
                self.first_token.get_or_insert(at);
                self.begin_token(self.pos, TokenizingState::SingleQuote);
            }
            b'"' => {
                self.first_token.get_or_insert(at);
                self.begin_token(self.pos, TokenizingState::DoubleQuote);
            }
            b'\\' => match self.peek_byte() {
                None if self.at_eof => {}
                None => {
                    self.pos = at;
                    return Ok(Step::NeedMore);
                }
                Some(b'\n') => self.pos += 1,
                Some(_) => {
                    self.begin_token(at, TokenizingState::Bare);
                    self.pos += 1;
                }
            },
            _ => self.begin_token(at, TokenizingState::Bare),
        }
        Ok(Step::Next)
    }

    fn handle_comment(&mut self, byte: u8) -> Step {
        match byte {
            b'\n' if self.mode == Mode::Line => Step::Terminated(self.pos - 1),
            b'\n' => {
                self.state = TokenizingState::Between;
                Step::Next
            }
            0 => Step::Terminated(self.pos - 1),
            _ => Step::Next,
        }
    }

    fn handle_bare(&mut self, byte: u8) -> Result<Step, TokenizeError> {
        match byte {
            b'\\' => match self.peek_byte() {
                None if self.at_eof => {}
                None => {
                    self.pos -= 1;
                    return Ok(Step::NeedMore);
                }
                Some(b'\n') => {
                    self.finish_token(self.pos - 1)?;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            },
            b' ' | b'\t' | b'\r' | b'\n' | b';' | b'#' | b'=' | b'\'' | b'"' | 0 => {
                // Let the separator be handled between tokens.
                self.pos -= 1;
                self.finish_token(self.pos)?;
            }
            _ => {}
        }
        Ok(Step::Next)
    }

    fn handle_single_quote(&mut self, byte: u8) -> Result<Step, TokenizeError> {
        if byte == b'\'' {
            let raw = &self.input[self.token_start..self.pos - 1];
            self.push_arg(to_string(raw.to_vec()))?;
            self.state = TokenizingState::Between;
        }
        Ok(Step::Next)
    }

    fn handle_double_quote(&mut self, byte: u8) -> Result<Step, TokenizeError> {
        match byte {
            b'\\' => match self.peek_byte() {
                None if self.at_eof => {}
                None => {
                    self.pos -= 1;
                    return Ok(Step::NeedMore);
                }
                Some(_) => self.pos += 1,
            },
            b'"' => self.finish_token(self.pos - 1)?,
            _ => {}
        }
        Ok(Step::Next)
    }

    fn finish_token(&mut self, end: usize) -> Result<(), TokenizeError> {
        let token = expand(&self.input[self.token_start..end], self.vars)?;
        self.push_arg(token)?;
        self.state = TokenizingState::Between;
        Ok(())
    }

    fn push_arg(&mut self, arg: String) -> Result<(), TokenizeError> {
        self.argv
            .try_reserve(1)
            .map_err(|_| TokenizeError::OutOfMemory)?;
        self.argv.push(arg);
        Ok(())
    }

    fn end_of_input(&mut self) -> Result<Scan, TokenizeError> {
        let quote = match self.state {
            TokenizingState::SingleQuote => Some(QuoteKind::Single),
            TokenizingState::DoubleQuote => Some(QuoteKind::Double),
            _ => None,
        };
        if !self.at_eof {
            return Ok(Scan::Incomplete);
        }
        if let Some(kind) = quote {
            return Err(TokenizeError::UnterminatedQuote(kind));
        }
        if self.state == TokenizingState::Bare {
            self.finish_token(self.input.len())?;
        }
        let end = self.input.len();
        Ok(self.complete(end, end))
    }

    fn complete(&mut self, end: usize, consumed: usize) -> Scan {
        let start = self.first_token.unwrap_or(end).min(end);
        let text = to_string(self.input[start..end].to_vec()).trim().to_string();
        Scan::Complete {
            statement: Statement {
                argv: mem::take(&mut self.argv),
                text,
            },
            consumed,
        }
    }
}

fn to_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

/// Resolves `\x` escapes and `${NAME}` substitutions in one pass.
///
/// Unset variables expand to nothing. A `$` not followed by `{`, and a `${`
/// without a closing brace, are kept as written. Substituted values are not
/// expanded again.
pub fn expand(raw: &[u8], vars: &dyn Variables) -> Result<String, TokenizeError> {
    let mut out: Vec<u8> = Vec::new();
    out.try_reserve(raw.len())
        .map_err(|_| TokenizeError::OutOfMemory)?;

    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'\\' => {
                if let Some(&escaped) = raw.get(i + 1) {
                    out.push(escaped);
                }
                i += 2;
            }
            b'$' if raw.get(i + 1) == Some(&b'{') => {
                let name_start = i + 2;
                match raw[name_start..].iter().position(|&b| b == b'}') {
                    Some(len) => {
                        let name = String::from_utf8_lossy(&raw[name_start..name_start + len]);
                        if let Some(value) = vars.lookup(&name) {
                            out.try_reserve(value.len())
                                .map_err(|_| TokenizeError::OutOfMemory)?;
                            out.extend_from_slice(value.as_bytes());
                        }
                        i = name_start + len + 1;
                    }
                    None => {
                        out.push(b'$');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    Ok(to_string(out))
}

/// Scans one statement from the start of `input`.
///
/// `at_eof` tells the scanner that no more input will follow, so the end of
/// `input` acts as a terminator and an open quote becomes an error.
pub fn scan(
    input: &[u8],
    mode: Mode,
    at_eof: bool,
    vars: &dyn Variables,
) -> Result<Scan, TokenizeError> {
    resume(input, mode, at_eof, vars, &mut ScanState::default())
}

/// Like [`scan`], but continues from `saved` when an earlier call on a
/// prefix of `input` came back [`Scan::Incomplete`].
///
/// `saved` is updated on [`Scan::Incomplete`] and reset otherwise.
pub(crate) fn resume(
    input: &[u8],
    mode: Mode,
    at_eof: bool,
    vars: &dyn Variables,
    saved: &mut ScanState,
) -> Result<Scan, TokenizeError> {
    let mut fsm = TokenizingFSM::new(input, mode, at_eof, vars, mem::take(saved));
    let scan = fsm.run()?;
    if scan == Scan::Incomplete {
        *saved = fsm.suspend();
    }
    Ok(scan)
}

/// Tokenizes the first statement of a complete line.
pub fn split(line: &str, vars: &dyn Variables) -> Result<Vec<String>, TokenizeError> {
    match scan(line.as_bytes(), Mode::Line, true, vars)? {
        Scan::Complete { statement, .. } => Ok(statement.argv),
        Scan::Incomplete => Ok(Vec::new()),
    }
}
