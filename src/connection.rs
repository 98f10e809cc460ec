//! Database connectivity seam and the registry of open connections.
//!
//! The shell never looks inside SQL: a [`Connection`] receives statement text
//! and hands back either rows or an affected-row count. Which database sits
//! behind it is up to the [`Driver`].

use crate::error::ShellError;
use anyhow::Result;

/// Rows returned by a query or a catalog request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    /// `None` is SQL NULL.
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }
}

/// What executing a statement produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    Rows(ResultSet),
    Affected(u64),
}

/// Catalog listings available through `SHOW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    DataTypes,
    Owners,
    Qualifiers,
    Tables,
    Types,
}

impl Catalog {
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Catalog::DataTypes,
            Catalog::Owners,
            Catalog::Qualifiers,
            Catalog::Tables,
            Catalog::Types,
        ]
        .into_iter()
        .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            Catalog::DataTypes => "datatypes",
            Catalog::Owners => "owners",
            Catalog::Qualifiers => "qualifiers",
            Catalog::Tables => "tables",
            Catalog::Types => "types",
        }
    }
}

/// A data source the driver knows about without connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub name: String,
    pub description: String,
}

/// Opens connections.
pub trait Driver {
    fn name(&self) -> &str;

    fn version(&self) -> String;

    fn data_sources(&self) -> Vec<DataSource>;

    fn connect(&self, dsn: &str) -> Result<Box<dyn Connection>>;
}

/// An open connection.
pub trait Connection {
    /// Executes one statement as written.
    fn execute(&mut self, sql: &str) -> Result<Execution>;

    fn catalog(&mut self, kind: Catalog) -> Result<ResultSet>;

    /// Drops and reopens the underlying connection.
    fn reconnect(&mut self) -> Result<()>;

    /// A one-line description of the server, for `VERSION`.
    fn describe(&self) -> String;
}

pub const DEFAULT_CONNECTION: &str = "default";

pub struct NamedConnection {
    pub name: String,
    pub dsn: String,
    pub handle: Box<dyn Connection>,
}

/// Open connections keyed by case-insensitive name, in opening order.
#[derive(Default)]
pub struct Connections {
    entries: Vec<NamedConnection>,
    current: Option<usize>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Registers a connection and makes it current.
    pub fn add(&mut self, conn: NamedConnection) -> Result<&NamedConnection, ShellError> {
        if self.contains(&conn.name) {
            return Err(ShellError::DuplicateConnection(conn.name));
        }
        self.entries.push(conn);
        let idx = self.entries.len() - 1;
        self.current = Some(idx);
        Ok(&self.entries[idx])
    }

    /// Removes the named connection, or the current one when `name` is `None`.
    ///
    /// When the current connection goes away the most recently opened
    /// remaining one becomes current.
    pub fn remove(&mut self, name: Option<&str>) -> Result<NamedConnection, ShellError> {
        let idx = self.resolve(name)?;
        let removed = self.entries.remove(idx);
        self.current = match self.current {
            Some(cur) if cur == idx => self.entries.len().checked_sub(1),
            Some(cur) if cur > idx => Some(cur - 1),
            other => other,
        };
        Ok(removed)
    }

    /// Makes the named connection current.
    pub fn switch(&mut self, name: &str) -> Result<&NamedConnection, ShellError> {
        let idx = self.resolve(Some(name))?;
        self.current = Some(idx);
        Ok(&self.entries[idx])
    }

    pub fn current(&self) -> Option<&NamedConnection> {
        self.current.map(|idx| &self.entries[idx])
    }

    pub fn current_mut(&mut self) -> Result<&mut NamedConnection, ShellError> {
        let idx = self.current.ok_or(ShellError::NotConnected)?;
        Ok(&mut self.entries[idx])
    }

    /// The named connection, or the current one when `name` is `None`.
    pub fn get_mut(&mut self, name: Option<&str>) -> Result<&mut NamedConnection, ShellError> {
        let idx = self.resolve(name)?;
        Ok(&mut self.entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (bool, &NamedConnection)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (Some(idx) == self.current, e))
    }

    /// Removes every connection, most recent first.
    pub fn drain(&mut self) -> Vec<NamedConnection> {
        self.current = None;
        let mut all: Vec<_> = self.entries.drain(..).collect();
        all.reverse();
        all
    }

    fn resolve(&self, name: Option<&str>) -> Result<usize, ShellError> {
        match name {
            Some(name) => self
                .position(name)
                .ok_or_else(|| ShellError::UnknownConnection(name.to_string())),
            None => self.current.ok_or(ShellError::NotConnected),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::bail;

    /// Connection double that answers `select` with a single row and
    /// everything else with one affected row.
    pub(crate) struct EchoConnection {
        pub dsn: String,
        pub reconnects: usize,
    }

    impl Connection for EchoConnection {
        fn execute(&mut self, sql: &str) -> Result<Execution> {
            if sql.to_ascii_lowercase().starts_with("select") {
                Ok(Execution::Rows(ResultSet {
                    columns: vec!["sql".into()],
                    rows: vec![vec![Some(sql.to_string())]],
                }))
            } else if sql.contains("fail") {
                bail!("statement failed")
            } else {
                Ok(Execution::Affected(1))
            }
        }

        fn catalog(&mut self, kind: Catalog) -> Result<ResultSet> {
            Ok(ResultSet {
                columns: vec!["catalog".into()],
                rows: vec![vec![Some(kind.name().to_string())]],
            })
        }

        fn reconnect(&mut self) -> Result<()> {
            self.reconnects += 1;
            Ok(())
        }

        fn describe(&self) -> String {
            format!("echo server for {}", self.dsn)
        }
    }

    pub(crate) struct EchoDriver;

    impl Driver for EchoDriver {
        fn name(&self) -> &str {
            "echo"
        }

        fn version(&self) -> String {
            "1.0".to_string()
        }

        fn data_sources(&self) -> Vec<DataSource> {
            vec![DataSource {
                name: "echo".into(),
                description: "echoes statements back".into(),
            }]
        }

        fn connect(&self, dsn: &str) -> Result<Box<dyn Connection>> {
            if dsn == "unreachable" {
                bail!("cannot reach {dsn}");
            }
            Ok(Box::new(EchoConnection {
                dsn: dsn.to_string(),
                reconnects: 0,
            }))
        }
    }

    fn named(name: &str) -> NamedConnection {
        NamedConnection {
            name: name.to_string(),
            dsn: format!("dsn-{name}"),
            handle: EchoDriver.connect(name).unwrap(),
        }
    }

    #[test]
    fn test_add_makes_current_and_rejects_duplicates() {
        let mut conns = Connections::new();
        conns.add(named("one")).unwrap();
        conns.add(named("two")).unwrap();
        assert_eq!(conns.current().unwrap().name, "two");

        let err = conns.add(named("ONE")).err().unwrap();
        assert!(matches!(err, ShellError::DuplicateConnection(_)));
        assert_eq!(conns.len(), 2);
    }

    #[test]
    fn test_remove_current_falls_back_to_last() {
        let mut conns = Connections::new();
        conns.add(named("a")).unwrap();
        conns.add(named("b")).unwrap();
        conns.add(named("c")).unwrap();
        conns.switch("B").unwrap();

        let removed = conns.remove(None).unwrap();
        assert_eq!(removed.name, "b");
        assert_eq!(conns.current().unwrap().name, "c");

        conns.remove(Some("c")).unwrap();
        assert_eq!(conns.current().unwrap().name, "a");
        conns.remove(None).unwrap();
        assert!(conns.current().is_none());
        assert!(matches!(conns.remove(None), Err(ShellError::NotConnected)));
    }

    #[test]
    fn test_remove_other_keeps_current() {
        let mut conns = Connections::new();
        conns.add(named("a")).unwrap();
        conns.add(named("b")).unwrap();
        conns.remove(Some("A")).unwrap();
        assert_eq!(conns.current().unwrap().name, "b");
        assert!(matches!(
            conns.remove(Some("zzz")),
            Err(ShellError::UnknownConnection(_))
        ));
    }

    #[test]
    fn test_iter_marks_current() {
        let mut conns = Connections::new();
        conns.add(named("a")).unwrap();
        conns.add(named("b")).unwrap();
        conns.switch("a").unwrap();
        let marks: Vec<_> = conns.iter().map(|(cur, e)| (cur, e.name.clone())).collect();
        assert_eq!(marks, vec![(true, "a".to_string()), (false, "b".to_string())]);
    }

    #[test]
    fn test_drain_closes_newest_first() {
        let mut conns = Connections::new();
        conns.add(named("a")).unwrap();
        conns.add(named("b")).unwrap();
        let names: Vec<_> = conns.drain().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["b", "a"]);
        assert!(conns.is_empty());
        assert!(conns.current().is_none());
    }

    #[test]
    fn test_catalog_names() {
        assert_eq!(Catalog::from_name("TABLES"), Some(Catalog::Tables));
        assert_eq!(Catalog::from_name("dsn"), None);
    }
}
