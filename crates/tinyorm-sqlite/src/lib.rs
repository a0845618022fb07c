//! SQLite driver for tinyorm.
//!
//! Wraps a single `rusqlite` connection behind the `tinyorm_core::Connection` trait:
//! values are bound positionally (`?1`, `?2`, ...), rows come back as `Row`, and
//! constraint failures reported by SQLite surface as `Error::Constraint`.
//!
//! Every statement is logged through `tracing`: at `info` when the engine was
//! configured with `echo`, at `debug` otherwise.

pub mod config;
pub mod connection;

pub use config::{DatabasePath, EngineConfig};
pub use connection::SqliteConnection;
