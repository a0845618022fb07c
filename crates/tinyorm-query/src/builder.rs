//! Query builders for INSERT, UPDATE, DELETE operations.
//!
//! The builders work from a table name and column values rather than a concrete
//! model type, so the session can drive them through `AnyModel`. Each also has a
//! `from_model` constructor for typed use.
//!
//! - INSERT omits NULL columns the database fills in and can add `RETURNING *`
//! - UPDATE sets every non-key column and matches on the primary key
//! - DELETE matches on the primary key or on explicit filters

use crate::clause::Where;
use crate::expr::{Dialect, Expr};
use tinyorm_core::{Connection, FieldInfo, Model, Result, Row, Value};

/// INSERT query builder.
///
/// # Example
///
/// ```ignore
/// // Insert and read back the stored row (assigned id, column defaults)
/// let row = InsertBuilder::from_model(&contact).execute_returning(&conn)?;
///
/// // Insert a link-table row
/// InsertBuilder::new("contact_person_number")
///     .value("contact_id", 1)
///     .value("phone_number_id", 4)
///     .execute(&conn)?;
/// ```
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    values: Vec<(String, Value)>,
    returning: bool,
}

impl InsertBuilder {
    /// Create an INSERT builder for `table` with no columns yet.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
            returning: false,
        }
    }

    /// Create an INSERT builder from a row of column values.
    ///
    /// NULL values are dropped for auto-increment and defaulted columns so the
    /// database assigns them.
    pub fn for_row(table: &str, fields: &[FieldInfo], row: &[(&str, Value)]) -> Self {
        let values = row
            .iter()
            .filter(|(name, value)| {
                let field = fields.iter().find(|f| f.column_name == *name);
                !(value.is_null() && field.is_some_and(FieldInfo::omit_when_null))
            })
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect();
        Self {
            table: table.to_string(),
            values,
            returning: false,
        }
    }

    /// Create an INSERT builder for a model instance.
    pub fn from_model<M: Model>(model: &M) -> Self {
        Self::for_row(M::TABLE_NAME, M::fields(), &model.to_row())
    }

    /// Add a column value.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    /// Add RETURNING * clause to return the inserted row.
    pub fn returning(mut self) -> Self {
        self.returning = true;
        self
    }

    /// Build the INSERT SQL and parameters with the default dialect.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the INSERT SQL and parameters with specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = if self.values.is_empty() {
            format!(
                "INSERT INTO {} DEFAULT VALUES",
                dialect.quote_identifier(&self.table)
            )
        } else {
            let columns: Vec<String> = self
                .values
                .iter()
                .map(|(c, _)| dialect.quote_identifier(c))
                .collect();
            let placeholders: Vec<String> =
                (1..=self.values.len()).map(|i| dialect.placeholder(i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                dialect.quote_identifier(&self.table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        if self.returning {
            sql.push_str(" RETURNING *");
        }

        let params = self.values.iter().map(|(_, v)| v.clone()).collect();
        (sql, params)
    }

    /// Execute the INSERT and return rows affected.
    pub fn execute<C: Connection + ?Sized>(&self, conn: &C) -> Result<u64> {
        let (sql, params) = self.build();
        conn.execute(&sql, &params)
    }

    /// Execute the INSERT with RETURNING and get the inserted row.
    ///
    /// This automatically adds RETURNING * and returns the full row.
    pub fn execute_returning<C: Connection + ?Sized>(&self, conn: &C) -> Result<Option<Row>> {
        let mut builder = self.clone();
        builder.returning = true;
        let (sql, params) = builder.build();
        conn.query_one(&sql, &params)
    }
}

/// UPDATE query builder.
///
/// # Example
///
/// ```ignore
/// // Update a model instance (uses primary key for WHERE)
/// UpdateBuilder::from_model(&contact).execute(&conn)?;
///
/// // Update with explicit SET
/// UpdateBuilder::new("address")
///     .set("contact_id", Value::Null)
///     .filter(Expr::col("contact_id").eq(3))
///     .execute(&conn)?;
/// ```
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    sets: Vec<(String, Value)>,
    where_clause: Option<Where>,
}

impl UpdateBuilder {
    /// Create an empty UPDATE builder for explicit SET operations.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sets: Vec::new(),
            where_clause: None,
        }
    }

    /// Create an UPDATE of every non-key column in `row`, matched by primary key.
    pub fn for_row(table: &str, fields: &[FieldInfo], row: &[(&str, Value)]) -> Self {
        let is_pk = |name: &str| fields.iter().any(|f| f.primary_key && f.column_name == name);
        let mut builder = Self::new(table);
        for (name, value) in row {
            if is_pk(*name) {
                builder = builder.filter(Expr::col(*name).eq(value.clone()));
            } else {
                builder = builder.set(*name, value.clone());
            }
        }
        builder
    }

    /// Create an UPDATE for a model instance.
    pub fn from_model<M: Model>(model: &M) -> Self {
        Self::for_row(M::TABLE_NAME, M::fields(), &model.to_row())
    }

    /// Set a column to a specific value.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((column.into(), value.into()));
        self
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Build the UPDATE SQL and parameters with the default dialect.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the UPDATE SQL and parameters with specific dialect.
    ///
    /// Returns empty SQL when there is nothing to set.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        if self.sets.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut params = Vec::new();
        let set_clauses: Vec<String> = self
            .sets
            .iter()
            .map(|(column, value)| {
                params.push(value.clone());
                format!(
                    "{} = {}",
                    dialect.quote_identifier(column),
                    dialect.placeholder(params.len())
                )
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_identifier(&self.table),
            set_clauses.join(", ")
        );

        if let Some(where_clause) = &self.where_clause {
            let (where_sql, where_params) = where_clause.build_with_dialect(dialect, params.len());
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }

        (sql, params)
    }

    /// Execute the UPDATE and return rows affected.
    pub fn execute<C: Connection + ?Sized>(&self, conn: &C) -> Result<u64> {
        let (sql, params) = self.build();
        if sql.is_empty() {
            return Ok(0);
        }
        conn.execute(&sql, &params)
    }
}

/// DELETE query builder.
///
/// # Example
///
/// ```ignore
/// // Delete by filter
/// DeleteBuilder::new("contact_person_number")
///     .filter(Expr::col("contact_id").eq(3))
///     .execute(&conn)?;
///
/// // Delete a specific model instance
/// DeleteBuilder::from_model(&contact).execute(&conn)?;
/// ```
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: String,
    where_clause: Option<Where>,
}

impl DeleteBuilder {
    /// Create a new DELETE builder for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_clause: None,
        }
    }

    /// Create a DELETE matching the given primary key columns and values.
    pub fn by_primary_key(table: &str, primary_key: &[&str], values: &[Value]) -> Self {
        primary_key
            .iter()
            .zip(values)
            .fold(Self::new(table), |builder, (column, value)| {
                builder.filter(Expr::col(*column).eq(value.clone()))
            })
    }

    /// Create a DELETE builder for a specific model instance.
    ///
    /// This automatically adds a WHERE clause matching the primary key.
    pub fn from_model<M: Model>(model: &M) -> Self {
        Self::by_primary_key(M::TABLE_NAME, M::PRIMARY_KEY, &model.primary_key_value())
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Build the DELETE SQL and parameters with the default dialect.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the DELETE SQL and parameters with specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = format!("DELETE FROM {}", dialect.quote_identifier(&self.table));
        let mut params = Vec::new();

        if let Some(where_clause) = &self.where_clause {
            let (where_sql, where_params) = where_clause.build_with_dialect(dialect, 0);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params = where_params;
        }

        (sql, params)
    }

    /// Execute the DELETE and return rows affected.
    pub fn execute<C: Connection + ?Sized>(&self, conn: &C) -> Result<u64> {
        let (sql, params) = self.build();
        conn.execute(&sql, &params)
    }
}
