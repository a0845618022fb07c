//! SQL column types.

use crate::value::{Value, parse_timestamp};

/// The storage type of a mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    /// Text with a declared maximum length, e.g. `VARCHAR(50)`.
    VarChar(u32),
    Boolean,
    DateTime,
    Blob,
}

impl SqlType {
    /// The type name used in SQLite DDL.
    pub fn sqlite_name(&self) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::VarChar(n) => format!("VARCHAR({n})"),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Blob => "BLOB".to_string(),
        }
    }

    /// Declared maximum length, if any.
    pub const fn max_length(&self) -> Option<u32> {
        match self {
            SqlType::VarChar(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether a value can be stored in a column of this type.
    ///
    /// NULL is always accepted here; nullability is checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (SqlType::Integer, Value::BigInt(_) | Value::Bool(_)) => true,
            (SqlType::Real, Value::Double(_) | Value::BigInt(_)) => true,
            (SqlType::Text | SqlType::VarChar(_), Value::Text(_)) => true,
            (SqlType::Boolean, Value::Bool(_)) => true,
            (SqlType::Boolean, Value::BigInt(i)) => *i == 0 || *i == 1,
            (SqlType::DateTime, Value::Timestamp(_)) => true,
            (SqlType::DateTime, Value::Text(s)) => parse_timestamp(s).is_some(),
            (SqlType::Blob, Value::Bytes(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sqlite_name())
    }
}
