//! Typed session options changed with `SET` and `UNSET`.

use crate::error::ShellError;
use std::env as stdenv;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_PROMPT: &str = "dbshell> ";
const HISTORY_FILE: &str = ".dbshell_history";

/// Every option the shell knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShellOption {
    ConfFile,
    Continue,
    Format,
    HistFile,
    History,
    MaxRows,
    Prompt,
    Silent,
    Verbose,
}

/// The kind of value an option holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// How result sets are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Csv,
    Fixed,
}

impl Format {
    fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("csv") {
            Some(Format::Csv)
        } else if value.eq_ignore_ascii_case("fixed") {
            Some(Format::Fixed)
        } else {
            None
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Csv => f.write_str("csv"),
            Format::Fixed => f.write_str("fixed"),
        }
    }
}

impl ShellOption {
    pub const ALL: [ShellOption; 9] = [
        ShellOption::ConfFile,
        ShellOption::Continue,
        ShellOption::Format,
        ShellOption::HistFile,
        ShellOption::History,
        ShellOption::MaxRows,
        ShellOption::Prompt,
        ShellOption::Silent,
        ShellOption::Verbose,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShellOption::ConfFile => "conffile",
            ShellOption::Continue => "continue",
            ShellOption::Format => "format",
            ShellOption::HistFile => "histfile",
            ShellOption::History => "history",
            ShellOption::MaxRows => "maxrows",
            ShellOption::Prompt => "prompt",
            ShellOption::Silent => "silent",
            ShellOption::Verbose => "verbose",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ShellOption::ConfFile => "Script read at start-up instead of the profile files.",
            ShellOption::Continue => "Continue after errors in scripts and batch input.",
            ShellOption::Format => "Result set format: csv or fixed.",
            ShellOption::HistFile => "File the command history is kept in.",
            ShellOption::History => "Load and save the command history.",
            ShellOption::MaxRows => "Maximum number of rows displayed per result set (0 = all).",
            ShellOption::Prompt => "Prompt displayed by the interactive shell.",
            ShellOption::Silent => "Suppress informational and error messages.",
            ShellOption::Verbose => "Display progress messages.",
        }
    }

    pub fn kind(self) -> OptionKind {
        match self {
            ShellOption::Continue
            | ShellOption::History
            | ShellOption::Silent
            | ShellOption::Verbose => OptionKind::Bool,
            ShellOption::MaxRows => OptionKind::Int,
            ShellOption::ConfFile
            | ShellOption::Format
            | ShellOption::HistFile
            | ShellOption::Prompt => OptionKind::Text,
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|opt| opt.name().eq_ignore_ascii_case(name))
    }
}

/// Current values of all options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    conffile: String,
    continue_on_error: bool,
    format: Format,
    histfile: String,
    history: bool,
    maxrows: i64,
    prompt: String,
    silent: bool,
    verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            conffile: String::new(),
            continue_on_error: false,
            format: Format::Csv,
            histfile: default_histfile(),
            history: true,
            maxrows: 0,
            prompt: DEFAULT_PROMPT.to_string(),
            silent: false,
            verbose: false,
        }
    }
}

fn default_histfile() -> String {
    stdenv::var_os("HOME")
        .map(|home| PathBuf::from(home).join(HISTORY_FILE).display().to_string())
        .unwrap_or_default()
}

impl Options {
    pub fn get(&self, opt: ShellOption) -> OptionValue {
        match opt {
            ShellOption::ConfFile => OptionValue::Text(self.conffile.clone()),
            ShellOption::Continue => OptionValue::Bool(self.continue_on_error),
            ShellOption::Format => OptionValue::Text(self.format.to_string()),
            ShellOption::HistFile => OptionValue::Text(self.histfile.clone()),
            ShellOption::History => OptionValue::Bool(self.history),
            ShellOption::MaxRows => OptionValue::Int(self.maxrows),
            ShellOption::Prompt => OptionValue::Text(self.prompt.clone()),
            ShellOption::Silent => OptionValue::Bool(self.silent),
            ShellOption::Verbose => OptionValue::Bool(self.verbose),
        }
    }

    /// Parses `raw` according to the option's kind and stores it.
    ///
    /// `None` restores the default value.
    pub fn set(&mut self, opt: ShellOption, raw: Option<&str>) -> Result<(), ShellError> {
        let Some(raw) = raw else {
            self.reset(opt);
            return Ok(());
        };
        let invalid = || ShellError::InvalidValue {
            option: opt.name().to_string(),
            value: raw.to_string(),
        };
        let value = match opt.kind() {
            OptionKind::Bool => OptionValue::Bool(parse_bool(raw).ok_or_else(invalid)?),
            OptionKind::Int => OptionValue::Int(parse_int(raw).ok_or_else(invalid)?),
            OptionKind::Text => OptionValue::Text(raw.to_string()),
        };
        self.store(opt, value)
    }

    /// Stores an already typed value.
    pub fn store(&mut self, opt: ShellOption, value: OptionValue) -> Result<(), ShellError> {
        match (opt, value) {
            (ShellOption::ConfFile, OptionValue::Text(v)) => self.conffile = v,
            (ShellOption::Continue, OptionValue::Bool(v)) => self.continue_on_error = v,
            (ShellOption::Format, OptionValue::Text(v)) => {
                self.format = Format::parse(&v).ok_or(ShellError::InvalidValue {
                    option: opt.name().to_string(),
                    value: v,
                })?;
            }
            (ShellOption::HistFile, OptionValue::Text(v)) => self.histfile = v,
            (ShellOption::History, OptionValue::Bool(v)) => self.history = v,
            (ShellOption::MaxRows, OptionValue::Int(v)) if v >= 0 => self.maxrows = v,
            (ShellOption::Prompt, OptionValue::Text(v)) => self.prompt = v,
            (ShellOption::Silent, OptionValue::Bool(v)) => self.silent = v,
            (ShellOption::Verbose, OptionValue::Bool(v)) => self.verbose = v,
            (opt, value) => {
                return Err(ShellError::InvalidValue {
                    option: opt.name().to_string(),
                    value: display_value(&value),
                });
            }
        }
        Ok(())
    }

    pub fn reset(&mut self, opt: ShellOption) {
        let defaults = Options::default();
        match opt {
            ShellOption::ConfFile => self.conffile = defaults.conffile,
            ShellOption::Continue => self.continue_on_error = defaults.continue_on_error,
            ShellOption::Format => self.format = defaults.format,
            ShellOption::HistFile => self.histfile = defaults.histfile,
            ShellOption::History => self.history = defaults.history,
            ShellOption::MaxRows => self.maxrows = defaults.maxrows,
            ShellOption::Prompt => self.prompt = defaults.prompt,
            ShellOption::Silent => self.silent = defaults.silent,
            ShellOption::Verbose => self.verbose = defaults.verbose,
        }
    }

    pub fn reset_all(&mut self) {
        *self = Options::default();
    }

    /// One line describing the option's current value, as `SET` prints it.
    pub fn show(&self, opt: ShellOption) -> String {
        let value = match (opt, self.get(opt)) {
            (ShellOption::Prompt | ShellOption::HistFile, OptionValue::Text(text)) => {
                format!("\"{text}\"")
            }
            (_, value) => display_value(&value),
        };
        format!("{:<15} {}", opt.name(), value)
    }

    pub fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    pub fn silent(&self) -> bool {
        self.silent
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Row limit for result sets; `None` when unlimited.
    pub fn max_rows(&self) -> Option<usize> {
        usize::try_from(self.maxrows).ok().filter(|&n| n > 0)
    }

    /// Where history is kept, if history is enabled and a file is configured.
    pub fn history_file(&self) -> Option<PathBuf> {
        (self.history && !self.histfile.is_empty()).then(|| PathBuf::from(&self.histfile))
    }

    pub fn conffile(&self) -> Option<PathBuf> {
        (!self.conffile.is_empty()).then(|| PathBuf::from(&self.conffile))
    }
}

fn display_value(value: &OptionValue) -> String {
    match value {
        OptionValue::Bool(true) => "yes".to_string(),
        OptionValue::Bool(false) => "no".to_string(),
        OptionValue::Int(n) => n.to_string(),
        OptionValue::Text(text) => text.clone(),
    }
}

/// Accepts true/yes/on/1 and false/no/off/0 in any letter case.
pub fn parse_bool(raw: &str) -> Option<bool> {
    const TRUE: [&str; 4] = ["true", "yes", "on", "1"];
    const FALSE: [&str; 4] = ["false", "no", "off", "0"];
    if TRUE.iter().any(|t| t.eq_ignore_ascii_case(raw)) {
        Some(true)
    } else if FALSE.iter().any(|f| f.eq_ignore_ascii_case(raw)) {
        Some(false)
    } else {
        None
    }
}

/// Parses a decimal, `0x` hexadecimal or leading-zero octal integer.
///
/// A sign may only come before the prefix.
pub fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (negative, digits) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        unsigned(hex, 16)?
    } else if digits.len() > 1 && digits.starts_with('0') {
        unsigned(&digits[1..], 8)?
    } else {
        unsigned(digits, 10)?
    };
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

fn unsigned(digits: &str, radix: u32) -> Option<u64> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(ShellOption::from_name("PROMPT"), Some(ShellOption::Prompt));
        assert_eq!(ShellOption::from_name("Continue"), Some(ShellOption::Continue));
        assert_eq!(ShellOption::from_name("nosuch"), None);
    }

    #[test]
    fn test_bool_values() {
        for raw in ["TRUE", "yes", "On", "1"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["false", "NO", "off", "0"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_int_values() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-7"), Some(-7));
        assert_eq!(parse_int("0x1f"), Some(31));
        assert_eq!(parse_int("010"), Some(8));
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("--1"), None);
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("ten"), None);
        assert_eq!(parse_int(""), None);
    }

    #[test]
    fn test_int_sign_only_before_prefix() {
        assert_eq!(parse_int("0x-5"), None);
        assert_eq!(parse_int("0x+5"), None);
        assert_eq!(parse_int("0+5"), None);
        assert_eq!(parse_int("0-5"), None);
        assert_eq!(parse_int("0x"), None);
    }

    #[test]
    fn test_int_range_limits() {
        assert_eq!(parse_int("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_int("9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_int("9223372036854775808"), None);
        assert_eq!(parse_int("-0x8000000000000000"), Some(i64::MIN));
        assert_eq!(parse_int("-9223372036854775809"), None);
    }

    #[test]
    fn test_set_and_show_prompt() {
        let mut opts = Options::default();
        opts.set(ShellOption::Prompt, Some("db> ")).unwrap();
        assert_eq!(opts.prompt(), "db> ");
        assert_eq!(opts.show(ShellOption::Prompt), "prompt          \"db> \"");
    }

    #[test]
    fn test_set_bool_rejects_garbage() {
        let mut opts = Options::default();
        let err = opts.set(ShellOption::Verbose, Some("sometimes")).unwrap_err();
        assert!(matches!(err, ShellError::InvalidValue { .. }));
        assert!(!opts.verbose());

        opts.set(ShellOption::Verbose, Some("on")).unwrap();
        assert!(opts.verbose());
        assert_eq!(opts.show(ShellOption::Verbose), "verbose         yes");
    }

    #[test]
    fn test_format_is_validated() {
        let mut opts = Options::default();
        opts.set(ShellOption::Format, Some("FIXED")).unwrap();
        assert_eq!(opts.format(), Format::Fixed);
        assert!(opts.set(ShellOption::Format, Some("xml")).is_err());
        assert_eq!(opts.format(), Format::Fixed);
    }

    #[test]
    fn test_reset_restores_default() {
        let mut opts = Options::default();
        opts.set(ShellOption::MaxRows, Some("10")).unwrap();
        assert_eq!(opts.max_rows(), Some(10));
        opts.set(ShellOption::MaxRows, None).unwrap();
        assert_eq!(opts.max_rows(), None);
        assert_eq!(opts.get(ShellOption::MaxRows), OptionValue::Int(0));
    }

    #[test]
    fn test_options_are_independent() {
        let mut opts = Options::default();
        let before = opts.get(ShellOption::Prompt);
        opts.set(ShellOption::Silent, Some("yes")).unwrap();
        opts.set(ShellOption::Continue, Some("yes")).unwrap();
        assert_eq!(opts.get(ShellOption::Prompt), before);
        assert!(opts.silent());
        assert!(opts.continue_on_error());
        assert!(!opts.verbose());
    }

    #[test]
    fn test_store_rejects_wrong_kind() {
        let mut opts = Options::default();
        assert!(
            opts.store(ShellOption::Silent, OptionValue::Int(1))
                .is_err()
        );
        assert!(
            opts.store(ShellOption::MaxRows, OptionValue::Int(-1))
                .is_err()
        );
    }

    #[test]
    fn test_default_histfile_follows_home() {
        let opts = Options::default();
        match stdenv::var_os("HOME") {
            Some(_) => assert!(
                opts.history_file()
                    .is_some_and(|p| p.ends_with(HISTORY_FILE))
            ),
            None => assert_eq!(opts.history_file(), None),
        }
    }
}
