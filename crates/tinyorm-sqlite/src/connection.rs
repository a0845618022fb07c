//! `Connection` implementation on top of `rusqlite`.

use std::sync::Arc;

use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{ErrorCode, params_from_iter};
use tinyorm_core::value::TIMESTAMP_FORMAT;
use tinyorm_core::{ConstraintKind, Connection, Error, Result, Row, Value};

use crate::config::{DatabasePath, EngineConfig};

/// A single SQLite connection.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    config: EngineConfig,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open (or create) a database file with default settings.
    pub fn open(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::from_config(&EngineConfig::file(path))
    }

    /// Open a private in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::from_config(&EngineConfig::memory())
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => rusqlite::Connection::open_in_memory(),
            DatabasePath::File(path) => rusqlite::Connection::open(path),
        }
        .map_err(|e| Error::Connection(e.to_string()))?;

        if config.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON")
                .map_err(|e| Error::Connection(e.to_string()))?;
        }

        tracing::debug!(path = ?config.path, foreign_keys = config.foreign_keys, "Opened SQLite connection");

        Ok(Self {
            conn,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn log(&self, sql: &str, params: &[Value]) {
        if self.config.echo {
            tracing::info!(sql = %sql, params = ?params, "Executing SQL");
        } else {
            tracing::debug!(sql = %sql, params = ?params, "Executing SQL");
        }
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.log(sql, params);

        let mut stmt = self.conn.prepare(sql).map_err(|e| map_error(sql, &e))?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let count = columns.len();

        let mut rows = stmt
            .query(params_from_iter(params.iter().map(to_sqlite)))
            .map_err(|e| map_error(sql, &e))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| map_error(sql, &e))? {
            let values = (0..count)
                .map(|i| row.get_ref(i).map(from_sqlite))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| map_error(sql, &e))?;
            out.push(Row::new(Arc::clone(&columns), values));
        }

        tracing::trace!(rows = out.len(), "Query returned");
        Ok(out)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.log(sql, params);

        let affected = self
            .conn
            .execute(sql, params_from_iter(params.iter().map(to_sqlite)))
            .map_err(|e| map_error(sql, &e))?;
        Ok(u64::try_from(affected).unwrap_or(u64::MAX))
    }
}

fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::BigInt(i) => SqliteValue::Integer(*i),
        Value::Double(f) => SqliteValue::Real(*f),
        Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::Bytes(b) => SqliteValue::Blob(b.clone()),
        Value::Timestamp(ts) => SqliteValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::BigInt(i),
        ValueRef::Real(f) => Value::Double(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

fn map_error(sql: &str, err: &rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, message) = err {
        if failure.code == ErrorCode::ConstraintViolation {
            let message = message.clone().unwrap_or_else(|| err.to_string());
            tracing::debug!(sql = %sql, error = %message, "Constraint violation");
            return Error::Constraint {
                kind: constraint_kind(&message),
                message,
            };
        }
    }
    Error::Query {
        sql: sql.to_string(),
        message: err.to_string(),
    }
}

/// Classify SQLite's constraint messages, e.g. `NOT NULL constraint failed: contact.first_name`.
fn constraint_kind(message: &str) -> ConstraintKind {
    if message.starts_with("FOREIGN KEY") {
        ConstraintKind::ForeignKey
    } else if message.starts_with("UNIQUE") {
        ConstraintKind::Unique
    } else if message.starts_with("PRIMARY KEY") {
        ConstraintKind::PrimaryKey
    } else if message.starts_with("NOT NULL") {
        ConstraintKind::NotNull
    } else if message.starts_with("CHECK") {
        ConstraintKind::Check
    } else {
        ConstraintKind::Other
    }
}
