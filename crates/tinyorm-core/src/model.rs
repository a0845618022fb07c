//! The `Model` trait and its type-erased counterpart.
//!
//! `Model` carries static table metadata and is normally implemented by
//! `#[derive(Model)]`. `AnyModel` is the object-safe view the session stores in its
//! identity map so it can hold contacts, addresses and phone numbers side by side.

use std::any::Any;
use std::fmt;

use crate::error::{Result, ValidationError};
use crate::field::FieldInfo;
use crate::relationship::{RelationSlot, RelationshipInfo};
use crate::row::Row;
use crate::validate::validate_row;
use crate::value::Value;

/// Callback invoked once per relationship field.
pub type RelationVisitor<'v> =
    dyn FnMut(&'static RelationshipInfo, &mut dyn RelationSlot) -> Result<()> + 'v;

/// Read-only counterpart of [`RelationVisitor`].
pub type RelationInspector<'v> = dyn FnMut(&'static RelationshipInfo, &dyn RelationSlot) + 'v;

/// A struct mapped to a database table.
pub trait Model: Sized + Clone + fmt::Debug + 'static {
    /// Table name.
    const TABLE_NAME: &'static str;

    /// Primary key column names.
    const PRIMARY_KEY: &'static [&'static str];

    /// Column metadata, in declaration order.
    fn fields() -> &'static [FieldInfo];

    /// Relationship metadata.
    fn relationships() -> &'static [RelationshipInfo] {
        &[]
    }

    /// Column values, in declaration order.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Build an instance from a result row. Relationship fields start unloaded.
    fn from_row(row: &Row) -> Result<Self>;

    /// Assign one column from a `Value`.
    fn set_value(&mut self, column: &str, value: &Value) -> Result<()>;

    fn primary_key_value(&self) -> Vec<Value> {
        let row = self.to_row();
        Self::PRIMARY_KEY
            .iter()
            .map(|pk| {
                row.iter()
                    .find(|(name, _)| name == pk)
                    .map_or(Value::Null, |(_, v)| v.clone())
            })
            .collect()
    }

    /// Whether the instance has not been assigned an identity yet.
    fn is_new(&self) -> bool {
        self.primary_key_value().iter().any(Value::is_null)
    }

    /// Visit each relationship container.
    fn visit_relationships_mut(&mut self, _visitor: &mut RelationVisitor<'_>) -> Result<()> {
        Ok(())
    }

    fn visit_relationships(&self, _visitor: &mut RelationInspector<'_>) {}
}

/// Type-erased model operations.
///
/// Blanket-implemented for every `Model`; `DynamicModel` implements it directly.
pub trait AnyModel: Any + fmt::Debug {
    fn table(&self) -> &'static str;

    fn field_infos(&self) -> &'static [FieldInfo];

    fn relationship_infos(&self) -> &'static [RelationshipInfo];

    fn row_values(&self) -> Vec<(&'static str, Value)>;

    fn assign(&mut self, column: &str, value: &Value) -> Result<()>;

    fn pk_values(&self) -> Vec<Value>;

    fn visit_related(&mut self, visitor: &mut RelationVisitor<'_>) -> Result<()>;

    fn inspect_related(&self, visitor: &mut RelationInspector<'_>);

    fn clone_boxed(&self) -> Box<dyn AnyModel>;

    fn model_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Assign every mapped column present in `row`.
    fn refresh_from(&mut self, row: &Row) -> Result<()> {
        for field in self.field_infos() {
            if let Some(value) = row.value(field.column_name) {
                let value = value.clone();
                self.assign(field.column_name, &value)?;
            }
        }
        Ok(())
    }

    /// Check the row against the column metadata before it is written.
    fn validate(&self, is_insert: bool) -> std::result::Result<(), ValidationError> {
        validate_row(
            self.table(),
            self.field_infos(),
            &self.row_values(),
            is_insert,
        )
    }

    /// Whether any relationship holds items not yet written.
    fn has_unsynced_related(&self) -> bool {
        let mut pending = false;
        self.inspect_related(&mut |_, slot| pending |= slot.has_unsynced());
        pending
    }

    fn pk_is_null(&self) -> bool {
        self.pk_values().iter().any(Value::is_null)
    }

    /// Value of one column.
    fn column_value(&self, column: &str) -> Option<Value> {
        self.row_values()
            .into_iter()
            .find(|(name, _)| *name == column)
            .map(|(_, v)| v)
    }
}

impl<M: Model> AnyModel for M {
    fn table(&self) -> &'static str {
        M::TABLE_NAME
    }

    fn field_infos(&self) -> &'static [FieldInfo] {
        M::fields()
    }

    fn relationship_infos(&self) -> &'static [RelationshipInfo] {
        M::relationships()
    }

    fn row_values(&self) -> Vec<(&'static str, Value)> {
        self.to_row()
    }

    fn assign(&mut self, column: &str, value: &Value) -> Result<()> {
        self.set_value(column, value)
    }

    fn pk_values(&self) -> Vec<Value> {
        self.primary_key_value()
    }

    fn visit_related(&mut self, visitor: &mut RelationVisitor<'_>) -> Result<()> {
        self.visit_relationships_mut(visitor)
    }

    fn inspect_related(&self, visitor: &mut RelationInspector<'_>) {
        self.visit_relationships(visitor);
    }

    fn clone_boxed(&self) -> Box<dyn AnyModel> {
        Box::new(self.clone())
    }

    fn model_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
