//! Untyped instances of mapped tables.
//!
//! `DynamicModel` holds values by column name for a table whose metadata comes from a
//! `Model`. Nothing checks the values when they are set; the session validates them
//! against the column types on flush, so a row built from loosely-typed input
//! (a JSON document, a form) fails there rather than at construction.

use std::any::Any;
use std::collections::HashMap;

use crate::error::{Error, Result, ValidationError};
use crate::field::FieldInfo;
use crate::model::{AnyModel, Model, RelationInspector, RelationVisitor};
use crate::relationship::RelationshipInfo;
use crate::row::Row;
use crate::validate::validate_row;
use crate::value::Value;

/// A row for a mapped table, with values of any type.
///
/// # Example
///
/// ```ignore
/// let mut row = DynamicModel::for_model::<Contact>();
/// row.set("first_name", 1);
/// row.set("age", "hello");
/// session.add_dynamic(row);
/// assert!(session.commit().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct DynamicModel {
    table_name: &'static str,
    fields: &'static [FieldInfo],
    values: HashMap<String, Value>,
}

impl DynamicModel {
    /// An empty row for `M`'s table.
    pub fn for_model<M: Model>() -> Self {
        Self {
            table_name: M::TABLE_NAME,
            fields: M::fields(),
            values: HashMap::new(),
        }
    }

    /// A row for `M`'s table populated from a JSON object, without type coercion.
    pub fn from_json<M: Model>(json: &serde_json::Value) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| Error::Custom("expected a JSON object".to_string()))?;
        let mut model = Self::for_model::<M>();
        for (column, value) in object {
            model.set(column.clone(), Value::from_json(value));
        }
        Ok(model)
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn has(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn primary_key_columns(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.column_name)
            .collect()
    }
}

impl AnyModel for DynamicModel {
    fn table(&self) -> &'static str {
        self.table_name
    }

    fn field_infos(&self) -> &'static [FieldInfo] {
        self.fields
    }

    fn relationship_infos(&self) -> &'static [RelationshipInfo] {
        &[]
    }

    fn row_values(&self) -> Vec<(&'static str, Value)> {
        self.fields
            .iter()
            .map(|f| {
                (
                    f.column_name,
                    self.values.get(f.column_name).cloned().unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Unlike derived models, a dynamic row can carry names the table does not have;
    /// those are reported too.
    fn validate(&self, is_insert: bool) -> std::result::Result<(), ValidationError> {
        let mut values: Vec<(&str, Value)> = self
            .row_values()
            .into_iter()
            .filter(|(column, _)| self.values.contains_key(*column))
            .collect();
        let mut extra: Vec<(&str, Value)> = self
            .values
            .iter()
            .filter(|(name, _)| !self.fields.iter().any(|f| f.column_name == name.as_str()))
            .map(|(name, value)| (name.as_str(), value.clone()))
            .collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));
        values.extend(extra);
        validate_row(self.table_name, self.fields, &values, is_insert)
    }

    fn assign(&mut self, column: &str, value: &Value) -> Result<()> {
        self.values.insert(column.to_string(), value.clone());
        Ok(())
    }

    fn pk_values(&self) -> Vec<Value> {
        self.primary_key_columns()
            .into_iter()
            .map(|c| self.values.get(c).cloned().unwrap_or(Value::Null))
            .collect()
    }

    fn visit_related(&mut self, _visitor: &mut RelationVisitor<'_>) -> Result<()> {
        Ok(())
    }

    fn inspect_related(&self, _visitor: &mut RelationInspector<'_>) {}

    fn clone_boxed(&self) -> Box<dyn AnyModel> {
        Box::new(self.clone())
    }

    fn model_name(&self) -> &'static str {
        "DynamicModel"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn refresh_from(&mut self, row: &Row) -> Result<()> {
        for (column, value) in row.iter() {
            self.values.insert(column.to_string(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;

    #[derive(Debug, Clone)]
    struct Vendor {
        vendor_id: Option<i64>,
        vendor_name: String,
    }

    impl Model for Vendor {
        const TABLE_NAME: &'static str = "networkdevicevendor";
        const PRIMARY_KEY: &'static [&'static str] = &["vendor_id"];

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("vendor_id", "vendor_id", SqlType::Integer)
                    .primary_key(true)
                    .auto_increment(true)
                    .nullable(true),
                FieldInfo::new("vendor_name", "vendor_name", SqlType::VarChar(50)),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("vendor_id", self.vendor_id.into()),
                ("vendor_name", self.vendor_name.clone().into()),
            ]
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                vendor_id: row.get_named("vendor_id")?,
                vendor_name: row.get_named("vendor_name")?,
            })
        }

        fn set_value(&mut self, column: &str, value: &Value) -> Result<()> {
            use crate::value::FromValue;
            match column {
                "vendor_id" => self.vendor_id = FromValue::from_value(value)?,
                "vendor_name" => self.vendor_name = FromValue::from_value(value)?,
                other => return Err(Error::ColumnNotFound(other.to_string())),
            }
            Ok(())
        }
    }

    #[test]
    fn test_for_model_uses_table_metadata() {
        let model = DynamicModel::for_model::<Vendor>();
        assert_eq!(model.table_name(), "networkdevicevendor");
        assert_eq!(model.primary_key_columns(), vec!["vendor_id"]);
        assert!(model.pk_is_null());
    }

    #[test]
    fn test_from_json_keeps_types() {
        let model =
            DynamicModel::from_json::<Vendor>(&serde_json::json!({"vendor_name": 7})).unwrap();
        assert_eq!(model.get("vendor_name"), Some(&Value::BigInt(7)));
        let row = model.row_values();
        assert_eq!(row[0], ("vendor_id", Value::Null));
        assert_eq!(row[1], ("vendor_name", Value::BigInt(7)));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(DynamicModel::from_json::<Vendor>(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_unmapped_columns_fail_validation() {
        let mut model = DynamicModel::for_model::<Vendor>();
        model.set("vendor_name", "Cisco");
        model.set("colour", "red");
        assert_eq!(model.row_values().len(), 2);
        let err = model.validate(true).unwrap_err();
        assert!(err.has_field("colour"));
    }

    #[test]
    fn test_type_errors_surface_on_validate() {
        let model =
            DynamicModel::from_json::<Vendor>(&serde_json::json!({"vendor_name": 7})).unwrap();
        let err = model.validate(true).unwrap_err();
        assert_eq!(err.errors[0].field, "vendor_name");
    }

    #[test]
    fn test_refresh_from_row() {
        let mut model = DynamicModel::for_model::<Vendor>();
        let row = Row::from_pairs(vec![
            ("vendor_id", Value::BigInt(3)),
            ("vendor_name", Value::from("Cisco")),
        ]);
        model.refresh_from(&row).unwrap();
        assert_eq!(model.pk_values(), vec![Value::BigInt(3)]);
    }
}
