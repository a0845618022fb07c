//! Fluent SQL query builder for tinyorm.
//!
//! `tinyorm-query` is the **query construction layer**. It turns `Model` metadata
//! and expressions into SQL plus bound parameters, without executing anything until
//! a terminal method is called with a `Connection`.
//!
//! # Role In The Architecture
//!
//! - **Expressions**: `Expr` builds WHERE/ORDER BY/JOIN conditions with numbered
//!   placeholders for the chosen `Dialect`.
//! - **SELECT**: `Select<M>` adds filters, ordering, limits, relationship joins and
//!   column projections, then materializes `M` values or raw rows.
//! - **Writes**: `InsertBuilder`, `UpdateBuilder` and `DeleteBuilder` take a table
//!   name and column values, which lets the session drive them for any mapped type.

pub mod builder;
pub mod clause;
pub mod expr;
pub mod select;

pub use builder::{DeleteBuilder, InsertBuilder, UpdateBuilder};
pub use clause::{Join, JoinType, OrderBy, OrderDirection, Where};
pub use expr::{BinaryOp, Dialect, Expr};
pub use select::{Select, relationship_joins, select};
