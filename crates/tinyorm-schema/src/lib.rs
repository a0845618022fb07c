//! Schema creation for tinyorm.
//!
//! `tinyorm-schema` turns model metadata into `CREATE TABLE` statements.
//!
//! - `SchemaBuilder` collects the tables for a set of models, including the link
//!   tables behind many-to-many relationships.
//! - `ddl` holds the dialect-neutral table definitions and the SQLite generator.
//! - `create_all` / `drop_all` apply the statements on a `Connection`.
//!
//! Creation is idempotent (`CREATE TABLE IF NOT EXISTS`). Existing tables are never
//! altered.

pub mod ddl;

use ddl::sqlite::SqliteDdlGenerator;
use ddl::{DdlGenerator, SchemaOperation, TableDef};
use tinyorm_core::{Connection, Model, Result};

/// Collects table definitions for a set of models.
#[derive(Debug, Default, Clone)]
pub struct SchemaBuilder {
    tables: Vec<TableDef>,
    link_tables: Vec<TableDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the table for `M` and the link tables of its many-to-many relationships.
    ///
    /// Tables already registered under the same name are skipped.
    #[must_use]
    pub fn create_table<M: Model>(mut self) -> Self {
        let table = TableDef::from_model::<M>();
        if !self.contains(&table.name) {
            self.tables.push(table);
        }
        for link in TableDef::link_tables_of::<M>() {
            if !self.contains(&link.name) {
                self.link_tables.push(link);
            }
        }
        self
    }

    fn contains(&self, name: &str) -> bool {
        self.tables
            .iter()
            .chain(self.link_tables.iter())
            .any(|t| t.name == name)
    }

    /// Registered tables in creation order: model tables, then link tables.
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.iter().chain(self.link_tables.iter())
    }

    /// `CREATE TABLE` statements in creation order.
    pub fn build(&self) -> Vec<String> {
        let ddl = SqliteDdlGenerator;
        self.tables()
            .flat_map(|t| ddl.generate(&SchemaOperation::CreateTable(t.clone())))
            .collect()
    }

    /// `DROP TABLE` statements, in reverse creation order.
    pub fn build_drop(&self) -> Vec<String> {
        let ddl = SqliteDdlGenerator;
        let names: Vec<&str> = self.tables().map(|t| t.name.as_str()).collect();
        names
            .into_iter()
            .rev()
            .flat_map(|name| ddl.generate(&SchemaOperation::DropTable(name.to_string())))
            .collect()
    }

    /// Create every registered table that does not exist yet.
    pub fn create_all<C: Connection + ?Sized>(&self, conn: &C) -> Result<()> {
        let statements = self.build();
        tracing::info!(tables = statements.len(), "Creating schema");
        for sql in &statements {
            conn.execute(sql, &[])?;
        }
        Ok(())
    }

    /// Drop every registered table.
    pub fn drop_all<C: Connection + ?Sized>(&self, conn: &C) -> Result<()> {
        let statements = self.build_drop();
        tracing::info!(tables = statements.len(), "Dropping schema");
        for sql in &statements {
            conn.execute(sql, &[])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tinyorm_core::{Related, RelatedMany, Row, Value};
    use tinyorm_macros::Model;

    #[derive(Model, Debug, Clone, Default)]
    #[tinyorm(table = "contact")]
    struct Contact {
        #[tinyorm(primary_key)]
        contact_id: Option<i64>,
        first_name: String,
        #[tinyorm(relationship(remote_key = "contact_id", back_populates = "contact"))]
        addresses: RelatedMany<Address>,
        #[tinyorm(relationship(
            link_table = "contact_phone_number",
            link_local = "contact_id",
            link_remote = "phone_number_id"
        ))]
        phone_numbers: RelatedMany<PhoneNumber>,
    }

    #[derive(Model, Debug, Clone, Default)]
    #[tinyorm(table = "address")]
    struct Address {
        #[tinyorm(primary_key)]
        address_id: Option<i64>,
        #[tinyorm(foreign_key = "contact.contact_id")]
        contact_id: Option<i64>,
        #[tinyorm(relationship(local_key = "contact_id", back_populates = "addresses"))]
        contact: Related<Contact>,
    }

    #[derive(Model, Debug, Clone, Default)]
    #[tinyorm(table = "phone_number")]
    struct PhoneNumber {
        #[tinyorm(primary_key)]
        phone_number_id: Option<i64>,
        number: String,
    }

    #[derive(Default)]
    struct RecordingConnection {
        executed: RefCell<Vec<String>>,
    }

    impl Connection for RecordingConnection {
        fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
            self.executed.borrow_mut().push(sql.to_string());
            Ok(0)
        }
    }

    fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
            .create_table::<Contact>()
            .create_table::<Address>()
            .create_table::<PhoneNumber>()
    }

    #[test]
    fn test_builder_orders_link_tables_last() {
        let names: Vec<String> = builder().tables().map(|t| t.name.clone()).collect();
        assert_eq!(
            names,
            vec!["contact", "address", "phone_number", "contact_phone_number"]
        );
    }

    #[test]
    fn test_builder_skips_duplicates() {
        let schema = builder().create_table::<Contact>();
        assert_eq!(schema.tables().count(), 4);
    }

    #[test]
    fn test_link_table_references_both_sides() {
        let stmts = builder().build();
        let link = &stmts[3];
        assert!(link.contains("REFERENCES \"contact\" (\"contact_id\")"));
        assert!(link.contains("REFERENCES \"phone_number\" (\"phone_number_id\")"));
    }

    #[test]
    fn test_create_all_executes_in_order() {
        let conn = RecordingConnection::default();
        builder().create_all(&conn).unwrap();
        let executed = conn.executed.borrow();
        assert_eq!(executed.len(), 4);
        assert!(executed[0].starts_with("CREATE TABLE IF NOT EXISTS \"contact\""));
        assert!(executed[1].contains("FOREIGN KEY (\"contact_id\")"));
    }

    #[test]
    fn test_drop_all_reverses_order() {
        let conn = RecordingConnection::default();
        builder().drop_all(&conn).unwrap();
        let executed = conn.executed.borrow();
        assert_eq!(executed[0], "DROP TABLE IF EXISTS \"contact_phone_number\"");
        assert_eq!(executed[3], "DROP TABLE IF EXISTS \"contact\"");
    }
}
