//! Database connection trait.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A synchronous database connection.
///
/// Parameters are bound positionally; SQL uses numbered placeholders (`?1`, `?2`, ...).
pub trait Connection {
    /// Run a statement that returns rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Run a statement and return its first row, if any.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Run a statement that does not return rows. Returns the number of rows affected.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Run several statements in order, stopping at the first error.
    fn batch(&self, statements: &[(String, Vec<Value>)]) -> Result<Vec<u64>> {
        statements
            .iter()
            .map(|(sql, params)| self.execute(sql, params))
            .collect()
    }

    fn begin(&self) -> Result<()> {
        self.execute("BEGIN", &[]).map(|_| ())
    }

    fn commit(&self) -> Result<()> {
        self.execute("COMMIT", &[]).map(|_| ())
    }

    fn rollback(&self) -> Result<()> {
        self.execute("ROLLBACK", &[]).map(|_| ())
    }
}

impl<C: Connection + ?Sized> Connection for &C {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn begin(&self) -> Result<()> {
        (**self).begin()
    }

    fn commit(&self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&self) -> Result<()> {
        (**self).rollback()
    }
}
