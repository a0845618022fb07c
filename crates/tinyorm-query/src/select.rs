//! SELECT query builder.

use std::fmt;
use std::marker::PhantomData;

use crate::clause::{Join, OrderBy, Where};
use crate::expr::{Dialect, Expr};
use tinyorm_core::{
    Connection, Error, Model, RelationshipInfo, RelationshipKind, Result, Row, Value,
    find_relationship,
};

/// A SELECT query for model `M`.
///
/// Nothing runs until a terminal operation (`all`, `first`, `one`, `one_or_none`,
/// `count`, `rows`) is called; printing the query shows the SQL it would send.
///
/// # Example
///
/// ```ignore
/// let adults = Select::<Contact>::new()
///     .filter(Expr::col("age").ge(18))
///     .order_by(OrderBy::desc(Expr::col("last_name")))
///     .limit(5)
///     .all(&conn)?;
/// ```
#[derive(Debug, Clone)]
pub struct Select<M: Model> {
    columns: Vec<String>,
    distinct: bool,
    joins: Vec<Join>,
    where_clause: Option<Where>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    dialect: Dialect,
    _marker: PhantomData<M>,
}

impl<M: Model> Select<M> {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            dialect: Dialect::default(),
            _marker: PhantomData,
        }
    }

    /// Select only the given columns of `M`'s table. Use `rows` to read the projection.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a WHERE condition; repeated calls are combined with AND.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Equality filter on a column of `M`'s own table.
    pub fn filter_by(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Expr::qualified(M::TABLE_NAME, column).eq(Expr::Value(value.into())))
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Join the table behind one of `M`'s relationships, using its key metadata.
    ///
    /// Many-to-many relationships join the link table and then the related table.
    pub fn join(mut self, relationship: &str) -> Result<Self> {
        let rel = find_relationship(M::relationships(), relationship).ok_or_else(|| {
            Error::Relationship(format!(
                "{} has no relationship named '{relationship}'",
                M::TABLE_NAME
            ))
        })?;
        self.joins
            .extend(relationship_joins(M::TABLE_NAME, M::PRIMARY_KEY, rel)?);
        Ok(self)
    }

    /// Join an arbitrary table on an explicit condition.
    pub fn join_on(mut self, table: impl Into<String>, on: Expr) -> Self {
        self.joins.push(Join::inner(table, on));
        self
    }

    /// Left outer join on an explicit condition.
    pub fn left_join_on(mut self, table: impl Into<String>, on: Expr) -> Self {
        self.joins.push(Join::left(table, on));
        self
    }

    fn select_list(&self) -> String {
        let qualify = |column: &str| {
            format!(
                "{}.{}",
                self.dialect.quote_identifier(M::TABLE_NAME),
                self.dialect.quote_identifier(column)
            )
        };
        if self.columns.is_empty() {
            M::fields()
                .iter()
                .map(|f| qualify(f.column_name))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            self.columns
                .iter()
                .map(|c| qualify(c.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    /// Build the SQL and its parameters.
    pub fn build(&self) -> (String, Vec<Value>) {
        let dialect = self.dialect;
        let mut params = Vec::new();

        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.select_list());
        sql.push_str(" FROM ");
        sql.push_str(&dialect.quote_identifier(M::TABLE_NAME));

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.build_with_dialect(dialect, &mut params, 0));
        }

        if let Some(where_clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(
                &where_clause
                    .expr()
                    .build_with_dialect(dialect, &mut params, 0),
            );
        }

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|o| o.build_with_dialect(dialect, &mut params, 0))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite only accepts OFFSET after a LIMIT.
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        (sql, params)
    }

    /// SQL counting the rows this query returns.
    pub fn count_sql(&self) -> (String, Vec<Value>) {
        let (inner, params) = self.build();
        (
            format!("SELECT count(*) AS count_1 FROM ({inner}) AS anon_1"),
            params,
        )
    }

    /// Run the query and build one `M` per row.
    pub fn all<C: Connection + ?Sized>(&self, conn: &C) -> Result<Vec<M>> {
        self.rows(conn)?.iter().map(M::from_row).collect()
    }

    /// The first result, if any.
    pub fn first<C: Connection + ?Sized>(&self, conn: &C) -> Result<Option<M>> {
        let limited = self.clone().limit(1);
        Ok(limited.all(conn)?.into_iter().next())
    }

    /// Exactly one result.
    pub fn one<C: Connection + ?Sized>(&self, conn: &C) -> Result<M> {
        self.one_or_none(conn)?.ok_or(Error::NotFound)
    }

    /// At most one result.
    pub fn one_or_none<C: Connection + ?Sized>(&self, conn: &C) -> Result<Option<M>> {
        let mut results = self.all(conn)?;
        match results.len() {
            0 => Ok(None),
            1 => Ok(results.pop()),
            n => Err(Error::MultipleRows(n)),
        }
    }

    pub fn count<C: Connection + ?Sized>(&self, conn: &C) -> Result<i64> {
        let (sql, params) = self.count_sql();
        tracing::debug!(sql = %sql, params = params.len(), "Executing COUNT");
        let row = conn.query_one(&sql, &params)?.ok_or(Error::NotFound)?;
        row.get_named("count_1")
    }

    /// Run the query and return the raw rows (for column projections).
    pub fn rows<C: Connection + ?Sized>(&self, conn: &C) -> Result<Vec<Row>> {
        let (sql, params) = self.build();
        tracing::debug!(sql = %sql, params = params.len(), "Executing SELECT");
        conn.query(&sql, &params)
    }
}

impl<M: Model> Default for Select<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> fmt::Display for Select<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build().0)
    }
}

/// Start a SELECT for `M`.
pub fn select<M: Model>() -> Select<M> {
    Select::new()
}

/// The joins that reach `rel`'s table from `table`.
pub fn relationship_joins(
    table: &str,
    primary_key: &[&str],
    rel: &RelationshipInfo,
) -> Result<Vec<Join>> {
    let missing = |what: &str| {
        Error::Relationship(format!(
            "relationship '{}' on {table} has no {what}",
            rel.name
        ))
    };
    let pk = primary_key
        .first()
        .copied()
        .ok_or_else(|| missing("primary key to join on"))?;

    let joins = match rel.kind {
        RelationshipKind::ManyToOne => {
            let local_key = rel.local_key.ok_or_else(|| missing("local_key"))?;
            vec![Join::inner(
                rel.related_table,
                Expr::qualified(rel.related_table, rel.related_key)
                    .eq(Expr::qualified(table, local_key)),
            )]
        }
        RelationshipKind::OneToMany | RelationshipKind::OneToOne => {
            let remote_key = rel.remote_key.ok_or_else(|| missing("remote_key"))?;
            vec![Join::inner(
                rel.related_table,
                Expr::qualified(rel.related_table, remote_key).eq(Expr::qualified(table, pk)),
            )]
        }
        RelationshipKind::ManyToMany => {
            let link = rel.link_table.ok_or_else(|| missing("link table"))?;
            vec![
                Join::inner(
                    link.table_name,
                    Expr::qualified(link.table_name, link.local_column)
                        .eq(Expr::qualified(table, pk)),
                ),
                Join::inner(
                    rel.related_table,
                    Expr::qualified(rel.related_table, rel.related_key)
                        .eq(Expr::qualified(link.table_name, link.remote_column)),
                ),
            ]
        }
    };
    Ok(joins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tinyorm_core::{RelatedMany, Related};
    use tinyorm_macros::Model;

    #[derive(Model, Debug, Clone, Default)]
    #[tinyorm(table = "contact")]
    struct Contact {
        #[tinyorm(primary_key)]
        contact_id: Option<i64>,
        first_name: String,
        last_name: String,
        #[tinyorm(relationship(remote_key = "contact_id", back_populates = "contact"))]
        addresses: RelatedMany<Address>,
        #[tinyorm(relationship(
            link_table = "contact_person_number",
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
        city: String,
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
        phone: String,
    }

    /// Returns canned rows and records the SQL it was given.
    struct CannedConnection {
        rows: Vec<Row>,
        seen: RefCell<Vec<String>>,
    }

    impl CannedConnection {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                rows,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Connection for CannedConnection {
        fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            self.seen.borrow_mut().push(sql.to_string());
            Ok(self.rows.clone())
        }

        fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
            self.seen.borrow_mut().push(sql.to_string());
            Ok(0)
        }
    }

    fn contact_row(id: i64, first: &str) -> Row {
        Row::from_pairs(vec![
            ("contact_id", Value::BigInt(id)),
            ("first_name", Value::from(first)),
            ("last_name", Value::from("Smith")),
        ])
    }

    #[test]
    fn test_select_all_columns() {
        let (sql, params) = select::<Contact>().build();
        assert_eq!(
            sql,
            "SELECT \"contact\".\"contact_id\", \"contact\".\"first_name\", \"contact\".\"last_name\" \
             FROM \"contact\""
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_filter_by_and_order() {
        let (sql, params) = select::<Contact>()
            .filter_by("first_name", "Jordan")
            .filter_by("last_name", "Smith")
            .order_by(OrderBy::desc(Expr::col("last_name")))
            .build();
        assert!(sql.ends_with(
            "WHERE \"contact\".\"first_name\" = ?1 AND \"contact\".\"last_name\" = ?2 \
             ORDER BY \"last_name\" DESC"
        ));
        assert_eq!(params, vec![Value::from("Jordan"), Value::from("Smith")]);
    }

    #[test]
    fn test_limit_offset() {
        let query = select::<Contact>().limit(5).offset(5);
        assert!(query.to_string().ends_with("LIMIT 5 OFFSET 5"));
        let query = select::<Contact>().offset(3);
        assert!(query.to_string().ends_with("LIMIT -1 OFFSET 3"));
    }

    #[test]
    fn test_join_one_to_many() {
        let query = select::<Contact>()
            .join("addresses")
            .unwrap()
            .filter(Expr::qualified("address", "city").eq("Springfield"));
        let (sql, params) = query.build();
        assert!(sql.contains(
            "FROM \"contact\" JOIN \"address\" ON \"address\".\"contact_id\" = \"contact\".\"contact_id\""
        ));
        assert!(sql.ends_with("WHERE \"address\".\"city\" = ?1"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_join_many_to_one() {
        let sql = select::<Address>().join("contact").unwrap().to_string();
        assert!(sql.contains(
            "JOIN \"contact\" ON \"contact\".\"contact_id\" = \"address\".\"contact_id\""
        ));
    }

    #[test]
    fn test_join_many_to_many_goes_through_link_table() {
        let sql = select::<Contact>().join("phone_numbers").unwrap().to_string();
        assert!(sql.contains(
            "JOIN \"contact_person_number\" ON \"contact_person_number\".\"contact_id\" = \"contact\".\"contact_id\" \
             JOIN \"phone_number\" ON \"phone_number\".\"phone_number_id\" = \"contact_person_number\".\"phone_number_id\""
        ));
    }

    #[test]
    fn test_unknown_relationship_is_an_error() {
        let err = select::<Contact>().join("pets").unwrap_err();
        assert!(matches!(err, Error::Relationship(_)));
    }

    #[test]
    fn test_projection_and_count_sql() {
        let query = select::<Contact>().columns(&["first_name", "last_name"]).distinct();
        assert!(query.to_string().starts_with(
            "SELECT DISTINCT \"contact\".\"first_name\", \"contact\".\"last_name\" FROM \"contact\""
        ));
        let (count_sql, _) = select::<Contact>().filter_by("first_name", "Jo").count_sql();
        assert!(count_sql.starts_with("SELECT count(*) AS count_1 FROM (SELECT"));
        assert!(count_sql.ends_with(") AS anon_1"));
    }

    #[test]
    fn test_one_and_one_or_none() {
        let conn = CannedConnection::new(vec![contact_row(1, "Russell")]);
        let contact = select::<Contact>().one(&conn).unwrap();
        assert_eq!(contact.first_name, "Russell");
        assert!(!contact.addresses.is_loaded());

        let conn = CannedConnection::new(Vec::new());
        assert!(select::<Contact>().one_or_none(&conn).unwrap().is_none());
        assert!(matches!(select::<Contact>().one(&conn), Err(Error::NotFound)));

        let conn = CannedConnection::new(vec![contact_row(1, "A"), contact_row(2, "B")]);
        assert!(matches!(
            select::<Contact>().one_or_none(&conn),
            Err(Error::MultipleRows(2))
        ));
    }

    #[test]
    fn test_first_adds_limit() {
        let conn = CannedConnection::new(vec![contact_row(1, "Russell")]);
        let first = select::<Contact>().first(&conn).unwrap();
        assert_eq!(first.map(|c| c.contact_id), Some(Some(1)));
        assert!(conn.seen.borrow()[0].ends_with("LIMIT 1"));
    }
}
