use crate::error::ShellError;
use crate::interpreter::Interpreter;
use crate::tokenizer::Statement;
use std::collections::HashMap;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// What a handler wants the shell to do after it returns successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Continue,
    /// Stop interpreting and exit with the given code.
    Exit(ExitCode),
}

/// Signature shared by all command handlers.
///
/// Handlers receive the whole interpreter so that commands like `SOURCE`
/// can run nested input through the same dispatch path.
pub type Handler = fn(&mut Interpreter, &Statement) -> Result<Status, ShellError>;

/// How one statement ended, as seen by the interpreter loop.
#[derive(Debug)]
pub enum Outcome {
    Ok,
    Terminate(ExitCode),
    /// Reported already; the loop continues only with continue-on-error.
    Recoverable(ShellError),
    /// Reported already; the loop always stops.
    Fatal(ShellError),
}

impl Outcome {
    /// Maps a handler result onto the interpreter's outcome.
    pub fn from_result(result: Result<Status, ShellError>) -> Self {
        match result {
            Ok(Status::Continue) => Outcome::Ok,
            Ok(Status::Exit(code)) => Outcome::Terminate(code),
            Err(err) if err.is_fatal() => Outcome::Fatal(err),
            Err(err) => Outcome::Recoverable(err),
        }
    }
}

/// Immutable registration record of one command.
#[derive(Clone, Copy)]
pub struct CommandDescriptor {
    pub name: &'static str,
    /// Fewest arguments accepted after the command name.
    pub min_args: usize,
    /// Most arguments accepted after the command name; `None` is unbounded.
    pub max_args: Option<usize>,
    pub handler: Handler,
    pub description: Option<&'static str>,
    pub usage: &'static [&'static str],
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

impl CommandDescriptor {
    pub const fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        handler: Handler,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            handler,
            description: None,
            usage: &[],
        }
    }

    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub const fn usage(mut self, usage: &'static [&'static str]) -> Self {
        self.usage = usage;
        self
    }

    /// Checks the number of arguments following the command name.
    pub fn check_arity(&self, argc: usize) -> Result<(), ShellError> {
        if argc < self.min_args {
            return Err(ShellError::MissingArguments(self.name.to_string()));
        }
        if self.max_args.is_some_and(|max| argc > max) {
            return Err(ShellError::TooManyArguments(self.name.to_string()));
        }
        Ok(())
    }
}

/// Ordered table of commands with case-insensitive lookup.
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: Vec<CommandDescriptor>,
    index: HashMap<String, usize>,
}

impl CommandTable {
    /// Builds the table, rejecting names registered twice in any letter case.
    pub fn new(entries: Vec<CommandDescriptor>) -> Result<Self, ShellError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (idx, desc) in entries.iter().enumerate() {
            if index.insert(desc.name.to_ascii_lowercase(), idx).is_some() {
                return Err(ShellError::DuplicateCommand(desc.name.to_string()));
            }
        }
        Ok(Self { entries, index })
    }

    pub fn lookup(&self, name: &str) -> Option<&CommandDescriptor> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&idx| &self.entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Interpreter, _: &Statement) -> Result<Status, ShellError> {
        Ok(Status::Continue)
    }

    #[test]
    fn test_arity_bounds() {
        let desc = CommandDescriptor::new("NAME", 2, Some(2), noop);
        assert!(matches!(
            desc.check_arity(0),
            Err(ShellError::MissingArguments(_))
        ));
        assert!(matches!(
            desc.check_arity(3),
            Err(ShellError::TooManyArguments(_))
        ));
        assert!(desc.check_arity(2).is_ok());
    }

    #[test]
    fn test_unbounded_arity() {
        let desc = CommandDescriptor::new("ECHO", 0, None, noop);
        assert!(desc.check_arity(0).is_ok());
        assert!(desc.check_arity(1000).is_ok());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = CommandTable::new(vec![
            CommandDescriptor::new("ECHO", 0, None, noop),
            CommandDescriptor::new("QUIT", 0, Some(0), noop).describe("Leave."),
        ])
        .unwrap();
        assert_eq!(table.lookup("echo").unwrap().name, "ECHO");
        assert_eq!(table.lookup("Quit").unwrap().description, Some("Leave."));
        assert!(table.lookup("nope").is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let err = CommandTable::new(vec![
            CommandDescriptor::new("ECHO", 0, None, noop),
            CommandDescriptor::new("echo", 0, None, noop),
        ])
        .unwrap_err();
        assert!(matches!(err, ShellError::DuplicateCommand(name) if name == "echo"));
    }

    #[test]
    fn test_outcome_mapping() {
        assert!(matches!(Outcome::from_result(Ok(Status::Continue)), Outcome::Ok));
        assert!(matches!(
            Outcome::from_result(Ok(Status::Exit(3))),
            Outcome::Terminate(3)
        ));
        assert!(matches!(
            Outcome::from_result(Err(ShellError::NotConnected)),
            Outcome::Recoverable(_)
        ));
        assert!(matches!(
            Outcome::from_result(Err(ShellError::OutOfMemory)),
            Outcome::Fatal(_)
        ));
    }
}
