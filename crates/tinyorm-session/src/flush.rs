//! Writing objects and their staged relationships, and loading relationships.
//!
//! These functions work on `dyn AnyModel` so the session can drive any mapped type.
//! Relationship containers are reached through `visit_related`; related items are
//! written depth-first:
//!
//! 1. many-to-one parents that have no primary key yet are inserted, and their key
//!    is copied into the local foreign key column
//! 2. the row itself is inserted (reading back the stored row) or updated
//! 3. one-to-many / one-to-one children get the foreign key and are written; for
//!    many-to-many items a link row is inserted

use tinyorm_core::{
    AnyModel, Connection, Error, RelationshipInfo, RelationshipKind, Result, Row, Value,
    find_relationship,
};
use tinyorm_query::{DeleteBuilder, Dialect, Expr, InsertBuilder, UpdateBuilder};

/// What to do with an object's own row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Write {
    Insert,
    Update,
    /// Only write staged relationship items.
    Skip,
}

/// A single-valued back-reference on some tracked parent that should point at `row`.
#[derive(Debug)]
pub(crate) struct BackReference {
    pub table: &'static str,
    pub key: Value,
    pub field: &'static str,
    pub row: Row,
}

/// Rows of another table touched by a delete.
#[derive(Debug)]
pub(crate) struct ChildEffect {
    pub table: &'static str,
    pub column: &'static str,
    pub key: Value,
    pub deleted: bool,
}

fn missing(rel: &RelationshipInfo, what: &str) -> Error {
    Error::Relationship(format!("relationship '{}' has no {what}", rel.name))
}

/// Write `obj` and everything staged in its relationships.
pub(crate) fn persist<C: Connection + ?Sized>(
    conn: &C,
    obj: &mut dyn AnyModel,
    write: Write,
    back_refs: &mut Vec<BackReference>,
) -> Result<()> {
    let linked = link_parents(conn, obj, back_refs)?;
    let write = if write == Write::Skip && !linked.is_empty() {
        Write::Update
    } else {
        write
    };

    write_row(conn, obj, write)?;

    if !linked.is_empty() {
        point_parents_at(obj, &linked, back_refs)?;
    }
    save_children(conn, obj, back_refs)
}

/// Insert unsaved many-to-one parents and copy their keys into `obj`.
///
/// Returns the names of the relationships whose parent was assigned.
fn link_parents<C: Connection + ?Sized>(
    conn: &C,
    obj: &mut dyn AnyModel,
    back_refs: &mut Vec<BackReference>,
) -> Result<Vec<&'static str>> {
    let mut assignments: Vec<(&'static str, Value)> = Vec::new();
    let mut linked = Vec::new();

    obj.visit_related(&mut |rel, slot| {
        if rel.kind != RelationshipKind::ManyToOne || !slot.has_unsynced() {
            return Ok(());
        }
        let local_key = rel.local_key.ok_or_else(|| missing(rel, "local key"))?;
        for parent in slot.unsynced_mut() {
            if parent.pk_is_null() {
                persist(conn, parent, Write::Insert, back_refs)?;
            }
            let key = parent.column_value(rel.related_key).unwrap_or(Value::Null);
            assignments.push((local_key, key));
        }
        slot.mark_synced();
        linked.push(rel.name);
        Ok(())
    })?;

    for (column, value) in &assignments {
        obj.assign(column, value)?;
    }
    Ok(linked)
}

fn write_row<C: Connection + ?Sized>(conn: &C, obj: &mut dyn AnyModel, write: Write) -> Result<()> {
    match write {
        Write::Insert => {
            obj.validate(true)?;
            let values = obj.row_values();
            let row = InsertBuilder::for_row(obj.table(), obj.field_infos(), &values)
                .execute_returning(conn)?
                .ok_or_else(|| {
                    Error::Session(format!("INSERT INTO {} returned no row", obj.table()))
                })?;
            obj.refresh_from(&row)?;
            tracing::debug!(table = obj.table(), pk = ?obj.pk_values(), "Inserted row");
        }
        Write::Update => {
            obj.validate(false)?;
            let values = obj.row_values();
            UpdateBuilder::for_row(obj.table(), obj.field_infos(), &values).execute(conn)?;
            tracing::debug!(table = obj.table(), pk = ?obj.pk_values(), "Updated row");
        }
        Write::Skip => {}
    }
    Ok(())
}

/// Point the single-valued back-references of `obj`'s freshly linked parents at `obj`.
fn point_parents_at(
    obj: &mut dyn AnyModel,
    linked: &[&'static str],
    back_refs: &mut Vec<BackReference>,
) -> Result<()> {
    let row = Row::from_pairs(obj.row_values());
    obj.visit_related(&mut |rel, slot| {
        if !linked.contains(&rel.name) {
            return Ok(());
        }
        let Some(field) = rel.back_populates else {
            return Ok(());
        };
        for parent in slot.items_mut() {
            fill_back_reference(parent, field, &row)?;
            if let Some(key) = parent.pk_values().into_iter().next() {
                back_refs.push(BackReference {
                    table: rel.related_table,
                    key,
                    field,
                    row: row.clone(),
                });
            }
        }
        Ok(())
    })
}

/// Load `row` into `obj`'s single-valued relationship `field`. Collections are left alone.
pub(crate) fn fill_back_reference(obj: &mut dyn AnyModel, field: &str, row: &Row) -> Result<()> {
    obj.visit_related(&mut |rel, slot| {
        if rel.name == field && !rel.kind.is_collection() {
            slot.load_rows(std::slice::from_ref(row))?;
        }
        Ok(())
    })
}

fn save_children<C: Connection + ?Sized>(
    conn: &C,
    obj: &mut dyn AnyModel,
    back_refs: &mut Vec<BackReference>,
) -> Result<()> {
    let key = obj.pk_values().into_iter().next().unwrap_or(Value::Null);
    let row = Row::from_pairs(obj.row_values());

    obj.visit_related(&mut |rel, slot| {
        if !slot.has_unsynced() {
            return Ok(());
        }
        match rel.kind {
            RelationshipKind::OneToMany | RelationshipKind::OneToOne => {
                let remote_key = rel.remote_key.ok_or_else(|| missing(rel, "remote key"))?;
                for child in slot.unsynced_mut() {
                    child.assign(remote_key, &key)?;
                    if let Some(field) = rel.back_populates {
                        fill_back_reference(child, field, &row)?;
                    }
                    let write = if child.pk_is_null() {
                        Write::Insert
                    } else {
                        Write::Update
                    };
                    persist(conn, child, write, back_refs)?;
                }
            }
            RelationshipKind::ManyToMany => {
                let link = rel.link_table.ok_or_else(|| missing(rel, "link table"))?;
                for item in slot.unsynced_mut() {
                    let write = if item.pk_is_null() {
                        Write::Insert
                    } else {
                        Write::Skip
                    };
                    persist(conn, item, write, back_refs)?;
                    let remote = item.column_value(rel.related_key).unwrap_or(Value::Null);
                    InsertBuilder::new(link.table_name)
                        .value(link.local_column, key.clone())
                        .value(link.remote_column, remote)
                        .execute(conn)?;
                }
            }
            RelationshipKind::ManyToOne => return Ok(()),
        }
        slot.mark_synced();
        Ok(())
    })
}

/// Delete `obj`'s row, first handling the rows that reference it.
///
/// Children of `cascade_delete` relationships are deleted; other children have their
/// foreign key set to NULL. Link rows are removed.
pub(crate) fn delete_row<C: Connection + ?Sized>(
    conn: &C,
    obj: &dyn AnyModel,
) -> Result<Vec<ChildEffect>> {
    let pk = obj.pk_values();
    let key = pk.first().cloned().unwrap_or(Value::Null);
    let mut effects = Vec::new();

    for rel in obj.relationship_infos() {
        match rel.kind {
            RelationshipKind::OneToMany | RelationshipKind::OneToOne => {
                let remote_key = rel.remote_key.ok_or_else(|| missing(rel, "remote key"))?;
                if rel.cascade_delete {
                    DeleteBuilder::new(rel.related_table)
                        .filter(Expr::col(remote_key).eq(key.clone()))
                        .execute(conn)?;
                } else {
                    UpdateBuilder::new(rel.related_table)
                        .set(remote_key, Value::Null)
                        .filter(Expr::col(remote_key).eq(key.clone()))
                        .execute(conn)?;
                }
                effects.push(ChildEffect {
                    table: rel.related_table,
                    column: remote_key,
                    key: key.clone(),
                    deleted: rel.cascade_delete,
                });
            }
            RelationshipKind::ManyToMany => {
                let link = rel.link_table.ok_or_else(|| missing(rel, "link table"))?;
                DeleteBuilder::new(link.table_name)
                    .filter(Expr::col(link.local_column).eq(key.clone()))
                    .execute(conn)?;
            }
            RelationshipKind::ManyToOne => {}
        }
    }

    let primary_key: Vec<&str> = obj
        .field_infos()
        .iter()
        .filter(|f| f.primary_key)
        .map(|f| f.column_name)
        .collect();
    DeleteBuilder::by_primary_key(obj.table(), &primary_key, &pk).execute(conn)?;
    tracing::debug!(table = obj.table(), pk = ?pk, "Deleted row");

    Ok(effects)
}

/// SQL selecting the rows of `rel` for `obj`, or `None` when no row can match.
fn relationship_query(obj: &dyn AnyModel, rel: &RelationshipInfo) -> Result<Option<(String, Vec<Value>)>> {
    let dialect = Dialect::Sqlite;
    let q = |name: &str| dialect.quote_identifier(name);
    let related = q(rel.related_table);
    let mut params = Vec::new();

    let sql = match rel.kind {
        RelationshipKind::ManyToOne => {
            let local_key = rel.local_key.ok_or_else(|| missing(rel, "local key"))?;
            let key = obj.column_value(local_key).unwrap_or(Value::Null);
            if key.is_null() {
                return Ok(None);
            }
            let cond = Expr::qualified(rel.related_table, rel.related_key).eq(key);
            format!(
                "SELECT * FROM {related} WHERE {}",
                cond.build_with_dialect(dialect, &mut params, 0)
            )
        }
        RelationshipKind::OneToMany | RelationshipKind::OneToOne => {
            let remote_key = rel.remote_key.ok_or_else(|| missing(rel, "remote key"))?;
            let key = obj.pk_values().into_iter().next().unwrap_or(Value::Null);
            if key.is_null() {
                return Ok(None);
            }
            let cond = Expr::qualified(rel.related_table, remote_key).eq(key);
            format!(
                "SELECT * FROM {related} WHERE {} ORDER BY {related}.{}",
                cond.build_with_dialect(dialect, &mut params, 0),
                q(rel.related_key)
            )
        }
        RelationshipKind::ManyToMany => {
            let link = rel.link_table.ok_or_else(|| missing(rel, "link table"))?;
            let key = obj.pk_values().into_iter().next().unwrap_or(Value::Null);
            if key.is_null() {
                return Ok(None);
            }
            let on = Expr::qualified(link.table_name, link.remote_column)
                .eq(Expr::qualified(rel.related_table, rel.related_key));
            let cond = Expr::qualified(link.table_name, link.local_column).eq(key);
            format!(
                "SELECT {related}.* FROM {related} JOIN {} ON {} WHERE {} ORDER BY {related}.{}",
                q(link.table_name),
                on.build_with_dialect(dialect, &mut params, 0),
                cond.build_with_dialect(dialect, &mut params, 0),
                q(rel.related_key)
            )
        }
    };
    Ok(Some((sql, params)))
}

/// Load relationship `name` of `obj` from the database.
///
/// Loaded children have their single-valued back-reference pointed at `obj`.
/// Items staged but not yet written stay in the container.
pub(crate) fn load_relationship<C: Connection + ?Sized>(
    conn: &C,
    obj: &mut dyn AnyModel,
    name: &str,
) -> Result<()> {
    let rel = find_relationship(obj.relationship_infos(), name).ok_or_else(|| {
        Error::Relationship(format!("{} has no relationship named '{name}'", obj.table()))
    })?;

    let rows = match relationship_query(obj, rel)? {
        Some((sql, params)) => conn.query(&sql, &params)?,
        None => Vec::new(),
    };
    tracing::debug!(
        table = obj.table(),
        relationship = name,
        rows = rows.len(),
        "Loaded relationship"
    );

    let own_row = Row::from_pairs(obj.row_values());
    obj.visit_related(&mut |r, slot| {
        if r.name != rel.name {
            return Ok(());
        }
        slot.load_rows(&rows)?;
        if let Some(field) = r.back_populates {
            for item in slot.items_mut() {
                fill_back_reference(item, field, &own_row)?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyorm_core::{Related, RelatedMany};
    use tinyorm_macros::Model;

    #[derive(Model, Debug, Clone, Default)]
    #[tinyorm(table = "contact")]
    struct Contact {
        #[tinyorm(primary_key)]
        contact_id: Option<i64>,
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
    }

    fn rel<M: tinyorm_core::Model>(name: &str) -> &'static RelationshipInfo {
        find_relationship(M::relationships(), name).unwrap()
    }

    #[test]
    fn test_one_to_many_query() {
        let contact = Contact {
            contact_id: Some(3),
            ..Contact::default()
        };
        let (sql, params) = relationship_query(&contact, rel::<Contact>("addresses"))
            .unwrap()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"address\" WHERE \"address\".\"contact_id\" = ?1 ORDER BY \"address\".\"address_id\""
        );
        assert_eq!(params, vec![Value::BigInt(3)]);
    }

    #[test]
    fn test_many_to_one_query_uses_foreign_key() {
        let address = Address {
            address_id: Some(1),
            contact_id: Some(7),
            ..Address::default()
        };
        let (sql, params) = relationship_query(&address, rel::<Address>("contact"))
            .unwrap()
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"contact\" WHERE \"contact\".\"contact_id\" = ?1"
        );
        assert_eq!(params, vec![Value::BigInt(7)]);
    }

    #[test]
    fn test_many_to_many_query_goes_through_link_table() {
        let contact = Contact {
            contact_id: Some(2),
            ..Contact::default()
        };
        let (sql, _) = relationship_query(&contact, rel::<Contact>("phone_numbers"))
            .unwrap()
            .unwrap();
        assert!(sql.starts_with("SELECT \"phone_number\".* FROM \"phone_number\" JOIN \"contact_person_number\""));
        assert!(sql.contains("\"contact_person_number\".\"contact_id\" = ?1"));
    }

    #[test]
    fn test_unsaved_object_has_nothing_to_load() {
        let contact = Contact::default();
        assert!(
            relationship_query(&contact, rel::<Contact>("addresses"))
                .unwrap()
                .is_none()
        );
        let orphan = Address::default();
        assert!(
            relationship_query(&orphan, rel::<Address>("contact"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_fill_back_reference_sets_single_value() {
        let mut address = Address::default();
        let row = Row::from_pairs(vec![("contact_id", Value::BigInt(4))]);
        fill_back_reference(&mut address, "contact", &row).unwrap();
        assert_eq!(address.contact.get().unwrap().contact_id, Some(4));
        assert!(address.contact.is_loaded());
    }
}
