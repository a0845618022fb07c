//! SQL clauses: WHERE, ORDER BY and JOIN.

use crate::expr::{Dialect, Expr};
use tinyorm_core::Value;

/// A WHERE clause: filters combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    expr: Expr,
}

impl Where {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    /// Add another condition with AND.
    pub fn and(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.and(expr),
        }
    }

    /// Add another condition with OR.
    pub fn or(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.or(expr),
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Render the condition. Placeholders are numbered from `offset + 1`.
    pub fn build_with_dialect(&self, dialect: Dialect, offset: usize) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.expr.build_with_dialect(dialect, &mut params, offset);
        (sql, params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: OrderDirection,
}

impl OrderBy {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Desc,
        }
    }

    pub fn build_with_dialect(&self, dialect: Dialect, params: &mut Vec<Value>, offset: usize) -> String {
        let expr_sql = self.expr.build_with_dialect(dialect, params, offset);
        match self.direction {
            OrderDirection::Asc => format!("{expr_sql} ASC"),
            OrderDirection::Desc => format!("{expr_sql} DESC"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    pub const fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "JOIN",
            JoinType::Left => "LEFT OUTER JOIN",
        }
    }
}

/// A JOIN against another table.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    pub on: Expr,
}

impl Join {
    pub fn inner(table: impl Into<String>, on: Expr) -> Self {
        Self {
            join_type: JoinType::Inner,
            table: table.into(),
            on,
        }
    }

    pub fn left(table: impl Into<String>, on: Expr) -> Self {
        Self {
            join_type: JoinType::Left,
            table: table.into(),
            on,
        }
    }

    pub fn build_with_dialect(&self, dialect: Dialect, params: &mut Vec<Value>, offset: usize) -> String {
        format!(
            "{} {} ON {}",
            self.join_type.as_str(),
            dialect.quote_identifier(&self.table),
            self.on.build_with_dialect(dialect, params, offset)
        )
    }
}
