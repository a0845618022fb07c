//! Queries bound to a session.

use std::collections::HashSet;
use std::fmt;

use tinyorm_core::{Connection, Error, Model, Result, Row, Value};
use tinyorm_query::{Expr, OrderBy, Select};

use crate::{Handle, Session};

/// A `Select` that runs through a session.
///
/// Pending changes are flushed before the query runs (when `auto_flush` is on), and
/// every returned row is resolved against the identity map: a row whose primary key
/// is already tracked yields the tracked instance, anything else becomes tracked.
/// Duplicate rows produced by joins collapse to one result.
pub struct SessionQuery<'s, M: Model, C: Connection> {
    session: &'s mut Session<C>,
    select: Select<M>,
}

impl<'s, M: Model, C: Connection> SessionQuery<'s, M, C> {
    pub(crate) fn new(session: &'s mut Session<C>) -> Self {
        Self {
            session,
            select: Select::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.select = self.select.filter(expr);
        self
    }

    /// Equality on a column of `M`'s own table.
    #[must_use]
    pub fn filter_by(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.select = self.select.filter_by(column, value);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.select = self.select.order_by(order);
        self
    }

    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.select = self.select.limit(n);
        self
    }

    #[must_use]
    pub fn offset(mut self, n: u64) -> Self {
        self.select = self.select.offset(n);
        self
    }

    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.select = self.select.distinct();
        self
    }

    /// Project onto the given columns; read the result with `rows`.
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.select = self.select.columns(columns);
        self
    }

    /// Inner join along one of `M`'s relationships.
    pub fn join(mut self, relationship: &str) -> Result<Self> {
        self.select = self.select.join(relationship)?;
        Ok(self)
    }

    #[must_use]
    pub fn join_on(mut self, table: impl Into<String>, on: Expr) -> Self {
        self.select = self.select.join_on(table, on);
        self
    }

    /// The underlying statement.
    pub fn statement(&self) -> &Select<M> {
        &self.select
    }

    fn fetch(self) -> Result<(&'s mut Session<C>, Vec<usize>)> {
        let session = self.session;
        session.autoflush()?;
        let rows = self.select.rows(session.connection())?;

        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = session.adopt_row::<M>(row)?;
            if seen.insert(id) {
                ids.push(id);
            }
        }
        Ok((session, ids))
    }

    /// Every matching instance.
    pub fn all(self) -> Result<Vec<M>> {
        let (session, ids) = self.fetch()?;
        Ok(ids
            .into_iter()
            .filter_map(|id| session.object::<M>(id).cloned())
            .collect())
    }

    /// Handles to every matching instance.
    pub fn handles(self) -> Result<Vec<Handle<M>>> {
        let (_, ids) = self.fetch()?;
        Ok(ids.into_iter().map(Handle::new).collect())
    }

    pub fn first(self) -> Result<Option<M>> {
        self.limit(1).all().map(|v| v.into_iter().next())
    }

    /// Exactly one instance; `Error::NotFound` or `Error::MultipleRows` otherwise.
    pub fn one(self) -> Result<M> {
        self.one_or_none()?.ok_or(Error::NotFound)
    }

    pub fn one_or_none(self) -> Result<Option<M>> {
        let mut results = self.all()?;
        match results.len() {
            0 => Ok(None),
            1 => Ok(results.pop()),
            n => Err(Error::MultipleRows(n)),
        }
    }

    pub fn count(self) -> Result<i64> {
        self.session.autoflush()?;
        self.select.count(self.session.connection())
    }

    /// Raw rows, for column projections.
    pub fn rows(self) -> Result<Vec<Row>> {
        self.session.autoflush()?;
        self.select.rows(self.session.connection())
    }
}

impl<M: Model, C: Connection> fmt::Display for SessionQuery<'_, M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.select, f)
    }
}
