//! tinyorm: a small unit-of-work ORM over SQLite.
//!
//! This crate is the facade over the workspace. Most programs only need the prelude:
//!
//! ```ignore
//! use tinyorm::prelude::*;
//!
//! #[derive(Model, Debug, Clone, Default)]
//! #[tinyorm(table = "contact")]
//! struct Contact {
//!     #[tinyorm(primary_key)]
//!     contact_id: Option<i64>,
//!     first_name: String,
//!     last_name: String,
//! }
//!
//! let conn = tinyorm::create_engine("sqlite:///db.sqlite3")?;
//! SchemaBuilder::new().create_table::<Contact>().create_all(&conn)?;
//!
//! let mut session = Session::new(conn);
//! session.add(Contact { first_name: "Jane".into(), last_name: "Doe".into(), ..Default::default() });
//! session.commit()?;
//! ```
//!
//! # Crates
//!
//! - `tinyorm-core`: `Model`, `Value`, `Row`, relationship containers, `Error`
//! - `tinyorm-macros`: `#[derive(Model)]`
//! - `tinyorm-query`: expressions and statement builders
//! - `tinyorm-schema`: `CREATE TABLE` generation
//! - `tinyorm-session`: the `Session` unit of work
//! - `tinyorm-sqlite`: the SQLite `Connection`
//!
//! Deriving `Model` generates paths into `tinyorm_core`, so crates that derive it
//! depend on `tinyorm-core` next to this one.

pub mod session;

pub use tinyorm_core::{
    AnyModel, Connection, ConstraintKind, DynamicModel, Error, FieldInfo, FromValue, Model,
    ReferentialAction, Related, RelatedMany, RelationshipInfo, RelationshipKind, Result, Row,
    SqlType, ValidationError, ValidationErrorKind, Value,
};
pub use tinyorm_macros::Model;
pub use tinyorm_query::{
    DeleteBuilder, Dialect, Expr, InsertBuilder, OrderBy, OrderDirection, Select, UpdateBuilder,
    select,
};
pub use tinyorm_schema::SchemaBuilder;
pub use tinyorm_sqlite::{DatabasePath, EngineConfig, SqliteConnection};

pub use session::{
    Handle, ObjectKey, ObjectState, Session, SessionConfig, SessionDebugInfo, SessionQuery,
};

/// Open a connection from a `sqlite://` URL with default settings.
///
/// See [`EngineConfig::from_url`] for the accepted forms.
pub fn create_engine(url: &str) -> Result<SqliteConnection> {
    create_engine_with(EngineConfig::from_url(url)?)
}

/// Open a connection from explicit settings.
pub fn create_engine_with(config: EngineConfig) -> Result<SqliteConnection> {
    tracing::info!(path = ?config.path, echo = config.echo, "Creating engine");
    SqliteConnection::from_config(&config)
}

/// Everything most programs need.
pub mod prelude {
    pub use crate::{
        AnyModel, Connection, DynamicModel, EngineConfig, Error, Expr, FromValue, Handle, Model,
        ObjectState, OrderBy, Related, RelatedMany, Result, Row, SchemaBuilder, Select, Session,
        SessionConfig, SqliteConnection, Value, create_engine, create_engine_with, select,
    };
}
