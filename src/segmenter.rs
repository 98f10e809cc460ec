//! Incremental statement reader.
//!
//! Bytes are appended with [`Segmenter::feed`] in whatever pieces the source
//! delivers them. [`Segmenter::next_statement`] hands out every statement that
//! is complete and keeps an unterminated tail for the next feed, so the result
//! does not depend on where the pieces were cut.
//!
//! An unterminated tail is not read twice: the tokenizer's progress through
//! it is kept and resumed on the next call.

use crate::env::Variables;
use crate::error::TokenizeError;
use crate::tokenizer::{self, Mode, Scan, ScanState, Statement};

#[derive(Debug)]
pub struct Segmenter {
    buf: Vec<u8>,
    pos: usize,
    mode: Mode,
    scan: ScanState,
}

impl Segmenter {
    pub fn new(mode: Mode) -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            mode,
            scan: ScanState::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Appends `bytes` after the unconsumed tail.
    ///
    /// Consumed bytes are dropped first so the tail always starts at the
    /// beginning of the buffer.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), TokenizeError> {
        self.compact();
        self.buf
            .try_reserve(bytes.len())
            .map_err(|_| TokenizeError::OutOfMemory)?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Returns the next complete, non-empty statement.
    ///
    /// `Ok(None)` means the buffered bytes do not hold a terminated statement
    /// yet.
    pub fn next_statement(
        &mut self,
        vars: &dyn Variables,
    ) -> Result<Option<Statement>, TokenizeError> {
        self.scan(vars, false)
    }

    /// Like [`Segmenter::next_statement`], but treats the end of the buffer as
    /// the end of input: a pending tail is returned as a final statement.
    ///
    /// An unterminated quote in the tail is reported once and the tail is
    /// discarded.
    pub fn finish(&mut self, vars: &dyn Variables) -> Result<Option<Statement>, TokenizeError> {
        self.scan(vars, true)
    }

    fn scan(
        &mut self,
        vars: &dyn Variables,
        at_eof: bool,
    ) -> Result<Option<Statement>, TokenizeError> {
        while self.pos < self.buf.len() {
            let pending = &self.buf[self.pos..];
            match tokenizer::resume(pending, self.mode, at_eof, vars, &mut self.scan) {
                Ok(Scan::Complete {
                    statement,
                    consumed,
                }) => {
                    self.pos += consumed;
                    if !statement.is_empty() {
                        return Ok(Some(statement));
                    }
                }
                Ok(Scan::Incomplete) => return Ok(None),
                Err(err) => {
                    self.clear();
                    return Err(err);
                }
            }
        }
        Ok(None)
    }

    /// Bytes received but not yet part of a returned statement.
    pub fn pending(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    /// Whether the pending bytes contain anything but whitespace.
    pub fn has_pending(&self) -> bool {
        self.pending().iter().any(|b| !b.is_ascii_whitespace())
    }

    /// Whether the last scan stopped inside a statement.
    ///
    /// Only meaningful once [`Segmenter::next_statement`] has returned
    /// `Ok(None)`.
    pub fn in_statement(&self) -> bool {
        !self.scan.is_blank()
    }

    /// Drops everything buffered.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.pos = 0;
        self.scan = ScanState::default();
    }

    fn compact(&mut self) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }
}
