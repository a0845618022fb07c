//! Result rows.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::{FromValue, Value};

/// A single result row: column names plus values in select order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. Rows from the same statement share one column list.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs, e.g. a model's `to_row()`.
    pub fn from_pairs<S: AsRef<str>>(pairs: Vec<(S, Value)>) -> Self {
        let mut columns = Vec::with_capacity(pairs.len());
        let mut values = Vec::with_capacity(pairs.len());
        for (name, value) in pairs {
            columns.push(name.as_ref().to_string());
            values.push(value);
        }
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at a positional index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value for a column. Qualified names (`contact.first_name`) match by their last part.
    pub fn value(&self, column: &str) -> Option<&Value> {
        let column = column.rsplit('.').next().unwrap_or(column);
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Typed value for a column.
    pub fn get_named<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self
            .value(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))?;
        T::from_value(value)
    }

    /// Iterate over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}
