//! Core types and traits for tinyorm.
//!
//! `tinyorm-core` is the **foundation layer** of the workspace. It defines the
//! traits and data types that every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Model` and `Connection` are the primary traits implemented by
//!   user models (usually through `#[derive(Model)]`) and by the SQLite driver.
//! - **Data model**: `Row`, `Value` and `SqlType` represent query inputs/outputs and are
//!   shared across the query, schema, session and driver crates.
//! - **Relationships**: `RelationshipInfo` is static metadata; `RelatedMany` and
//!   `Related` are the in-memory containers the session loads and flushes.
//!
//! # Who Uses This Crate
//!
//! - `tinyorm-macros` generates `Model` implementations defined here.
//! - `tinyorm-query` consumes `Model` metadata and `Value` to build SQL.
//! - `tinyorm-schema` inspects `FieldInfo`/`RelationshipInfo` to generate DDL.
//! - `tinyorm-session` drives `AnyModel` objects through a `Connection`.
//! - `tinyorm-sqlite` implements `Connection` and operates on `Row`/`Value`.

pub mod connection;
pub mod dynamic;
pub mod error;
pub mod field;
pub mod model;
pub mod relationship;
pub mod row;
pub mod types;
pub mod validate;
pub mod value;

pub use connection::Connection;
pub use dynamic::DynamicModel;
pub use error::{
    ConstraintKind, Error, FieldValidationError, Result, ValidationError, ValidationErrorKind,
};
pub use field::{FieldInfo, ReferentialAction};
pub use model::{AnyModel, Model, RelationInspector, RelationVisitor};
pub use relationship::{
    LinkTableInfo, RelationSlot, Related, RelatedMany, RelationshipInfo, RelationshipKind,
    find_relationship,
};
pub use row::Row;
pub use types::SqlType;
pub use validate::{matches_pattern, validate_row};
pub use value::{FromValue, Value};
