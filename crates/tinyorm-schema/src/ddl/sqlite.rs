//! SQLite DDL generator.

use super::{ColumnDef, DdlGenerator, SchemaOperation, TableDef, quote_identifier};

/// DDL generator for SQLite.
pub struct SqliteDdlGenerator;

impl DdlGenerator for SqliteDdlGenerator {
    fn dialect(&self) -> &'static str {
        "sqlite"
    }

    fn generate(&self, op: &SchemaOperation) -> Vec<String> {
        tracing::debug!(dialect = "sqlite", op = ?op, "Generating DDL");

        let statements = match op {
            SchemaOperation::CreateTable(table) => vec![generate_create_table(table)],
            SchemaOperation::DropTable(name) => {
                vec![format!("DROP TABLE IF EXISTS {}", quote_identifier(name))]
            }
        };

        for stmt in &statements {
            tracing::trace!(sql = %stmt, "Generated SQLite DDL statement");
        }

        statements
    }
}

/// Whether the column is the table's rowid alias (a lone integer primary key).
fn is_rowid_alias(table: &TableDef, column: &ColumnDef) -> bool {
    column.primary_key && table.primary_key.len() == 1 && column.sql_type == "INTEGER"
}

fn column_sql(table: &TableDef, column: &ColumnDef) -> String {
    let mut sql = format!("{} {}", quote_identifier(&column.name), column.sql_type);

    if is_rowid_alias(table, column) {
        sql.push_str(" PRIMARY KEY");
        if column.auto_increment {
            sql.push_str(" AUTOINCREMENT");
        }
        return sql;
    }

    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    sql
}

fn generate_create_table(table: &TableDef) -> String {
    let mut parts: Vec<String> = table.columns.iter().map(|c| column_sql(table, c)).collect();

    let inline_pk = table
        .columns
        .iter()
        .any(|c| is_rowid_alias(table, c));
    if !table.primary_key.is_empty() && !inline_pk {
        let cols: Vec<String> = table.primary_key.iter().map(|c| quote_identifier(c)).collect();
        parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
    }

    for fk in &table.foreign_keys {
        let mut constraint = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_identifier(&fk.column),
            quote_identifier(&fk.foreign_table),
            quote_identifier(&fk.foreign_column)
        );
        if let Some(action) = fk.on_delete {
            constraint.push_str(" ON DELETE ");
            constraint.push_str(action.as_sql());
        }
        parts.push(constraint);
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_identifier(&table.name),
        parts.join(",\n    ")
    )
}
