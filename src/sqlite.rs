//! SQLite driver backed by `rusqlite`.
//!
//! A DSN is either a file path, `:memory:`, or a connection string such as
//! `Driver=SQLite;Database=/tmp/app.db` whose `Database`, `DSN` or
//! `Data Source` key names the file.

use crate::connection::{Catalog, Connection, DataSource, Driver, Execution, ResultSet};
use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use tracing::debug;

const MEMORY: &str = ":memory:";

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> String {
        format!("SQLite {}", rusqlite::version())
    }

    fn data_sources(&self) -> Vec<DataSource> {
        vec![DataSource {
            name: MEMORY.to_string(),
            description: "private in-memory database".to_string(),
        }]
    }

    fn connect(&self, dsn: &str) -> Result<Box<dyn Connection>> {
        let path = database_path(dsn);
        let conn = SqliteConnection::open(path)?;
        Ok(Box::new(conn))
    }
}

/// Extracts the database file from a DSN.
pub fn database_path(dsn: &str) -> &str {
    if !dsn.contains('=') {
        return dsn.trim();
    }
    dsn.split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| {
            let key = key.trim();
            ["database", "dsn", "data source"]
                .iter()
                .any(|k| k.eq_ignore_ascii_case(key))
        })
        .map(|(_, value)| value.trim())
        .unwrap_or(MEMORY)
}

pub struct SqliteConnection {
    path: String,
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    pub fn open(path: &str) -> Result<Self> {
        debug!(path, "opening sqlite database");
        let conn = if path.is_empty() || path == MEMORY {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
        .with_context(|| format!("cannot open database \"{path}\""))?;
        Ok(Self {
            path: path.to_string(),
            conn,
        })
    }

    fn query(&self, sql: &str) -> Result<ResultSet> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut result = ResultSet::new(columns);
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(render_value(row.get_ref(idx)?));
            }
            result.rows.push(values);
        }
        Ok(result)
    }
}

fn render_value(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Some(bytes.iter().map(|b| format!("{b:02x}")).collect()),
    }
}

fn single_column(name: &str, values: &[&str]) -> ResultSet {
    ResultSet {
        columns: vec![name.to_string()],
        rows: values
            .iter()
            .map(|v| vec![Some(v.to_string())])
            .collect(),
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> Result<Execution> {
        let returns_rows = self.conn.prepare(sql)?.column_count() > 0;
        if returns_rows {
            return Ok(Execution::Rows(self.query(sql)?));
        }
        let affected = self.conn.execute(sql, [])?;
        Ok(Execution::Affected(affected as u64))
    }

    fn catalog(&mut self, kind: Catalog) -> Result<ResultSet> {
        match kind {
            Catalog::Tables => self.query(
                "SELECT name AS TABLE_NAME, upper(type) AS TABLE_TYPE FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' ORDER BY name",
            ),
            Catalog::Qualifiers => {
                self.query("SELECT name AS TABLE_QUALIFIER FROM pragma_database_list ORDER BY seq")
            }
            Catalog::Owners => Ok(ResultSet::new(vec!["TABLE_OWNER".to_string()])),
            Catalog::Types => Ok(single_column(
                "TABLE_TYPE",
                &["SYSTEM TABLE", "TABLE", "VIEW"],
            )),
            Catalog::DataTypes => Ok(single_column(
                "TYPE_NAME",
                &["BLOB", "INTEGER", "NULL", "REAL", "TEXT"],
            )),
        }
    }

    fn reconnect(&mut self) -> Result<()> {
        *self = SqliteConnection::open(&self.path)?;
        Ok(())
    }

    fn describe(&self) -> String {
        let target = if self.path.is_empty() { MEMORY } else { &self.path };
        format!("SQLite {} ({target})", rusqlite::version())
    }
}
