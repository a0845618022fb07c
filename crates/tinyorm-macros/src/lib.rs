//! Procedural macros for tinyorm.
//!
//! - `#[derive(Model)]` maps a struct with named fields to a table: it generates the
//!   static column and relationship metadata plus row conversion.
//!
//! # Attributes
//!
//! On the struct:
//!
//! - `#[tinyorm(table = "name")]` (defaults to the struct name, lowercased)
//!
//! On fields:
//!
//! - `primary_key`, `column = ".."`, `foreign_key = "table.column"`,
//!   `on_delete = "cascade"`, `default = "sql expr"`, `max_length = N`,
//!   `pattern = "regex"`, `email`
//! - `relationship(kind = "one_to_many", remote_key = "..", back_populates = "..")`
//!   and friends, on `RelatedMany<T>` / `Related<T>` fields

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod model_derive;

/// Derive `tinyorm_core::Model` for a struct.
///
/// # Example
///
/// ```ignore
/// #[derive(Model, Debug, Clone, Default)]
/// #[tinyorm(table = "address")]
/// pub struct Address {
///     #[tinyorm(primary_key)]
///     pub address_id: Option<i64>,
///     pub street_name: String,
///     #[tinyorm(foreign_key = "contact.contact_id")]
///     pub contact_id: Option<i64>,
///     #[tinyorm(relationship(local_key = "contact_id", back_populates = "addresses"))]
///     pub contact: Related<Contact>,
/// }
/// ```
#[proc_macro_derive(Model, attributes(tinyorm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match model_derive::parse_model(&input) {
        Ok(def) => model_derive::generate_model_impl(&def).into(),
        Err(err) => err.to_compile_error().into(),
    }
}
