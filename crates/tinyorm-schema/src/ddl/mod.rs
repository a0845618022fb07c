//! DDL generation.
//!
//! Model metadata is first turned into a dialect-neutral `TableDef`; a
//! `DdlGenerator` then renders schema operations on it as SQL statements.

pub mod sqlite;

use tinyorm_core::{FieldInfo, LinkTableInfo, Model, ReferentialAction, RelationshipKind};

/// A column in a table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// SQL type name, e.g. `INTEGER` or `VARCHAR(50)`.
    pub sql_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Default expression (SQL).
    pub default: Option<String>,
}

impl ColumnDef {
    fn from_field(field: &FieldInfo) -> Self {
        Self {
            name: field.column_name.to_string(),
            sql_type: field.sql_type.sqlite_name(),
            nullable: field.nullable,
            primary_key: field.primary_key,
            auto_increment: field.auto_increment,
            default: field.default.map(str::to_string),
        }
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
    pub on_delete: Option<ReferentialAction>,
}

/// A table to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Primary key column names.
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl TableDef {
    /// The table a model maps to.
    pub fn from_model<M: Model>() -> Self {
        Self::from_fields(M::TABLE_NAME, M::fields())
    }

    /// A table from column metadata.
    pub fn from_fields(table: &str, fields: &[FieldInfo]) -> Self {
        let foreign_keys = fields
            .iter()
            .filter_map(|f| {
                let (foreign_table, foreign_column) = f.foreign_key_parts()?;
                Some(ForeignKeyDef {
                    column: f.column_name.to_string(),
                    foreign_table: foreign_table.to_string(),
                    foreign_column: foreign_column.to_string(),
                    on_delete: f.on_delete,
                })
            })
            .collect();

        Self {
            name: table.to_string(),
            columns: fields.iter().map(ColumnDef::from_field).collect(),
            primary_key: fields
                .iter()
                .filter(|f| f.primary_key)
                .map(|f| f.column_name.to_string())
                .collect(),
            foreign_keys,
        }
    }

    /// The link table behind a many-to-many relationship.
    ///
    /// `local` and `remote` are the `(table, key column)` pairs the two link columns
    /// reference. Link rows go away with either side.
    pub fn link_table(link: &LinkTableInfo, local: (&str, &str), remote: (&str, &str)) -> Self {
        let column = |name: &str| ColumnDef {
            name: name.to_string(),
            sql_type: "INTEGER".to_string(),
            nullable: false,
            primary_key: true,
            auto_increment: false,
            default: None,
        };
        let foreign_key = |name: &str, (table, key): (&str, &str)| ForeignKeyDef {
            column: name.to_string(),
            foreign_table: table.to_string(),
            foreign_column: key.to_string(),
            on_delete: Some(ReferentialAction::Cascade),
        };

        Self {
            name: link.table_name.to_string(),
            columns: vec![column(link.local_column), column(link.remote_column)],
            primary_key: vec![
                link.local_column.to_string(),
                link.remote_column.to_string(),
            ],
            foreign_keys: vec![
                foreign_key(link.local_column, local),
                foreign_key(link.remote_column, remote),
            ],
        }
    }

    /// Link tables declared by `M`'s many-to-many relationships.
    pub fn link_tables_of<M: Model>() -> Vec<Self> {
        let Some(pk) = M::PRIMARY_KEY.first() else {
            return Vec::new();
        };
        M::relationships()
            .iter()
            .filter(|r| r.kind == RelationshipKind::ManyToMany)
            .filter_map(|r| {
                let link = r.link_table?;
                Some(Self::link_table(
                    &link,
                    (M::TABLE_NAME, pk),
                    (r.related_table, r.related_key),
                ))
            })
            .collect()
    }
}

/// A schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOperation {
    CreateTable(TableDef),
    DropTable(String),
}

/// Renders schema operations for one SQL dialect.
pub trait DdlGenerator {
    fn dialect(&self) -> &'static str;

    fn generate(&self, op: &SchemaOperation) -> Vec<String>;
}

/// Quote an identifier with double quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
