//! Relationship metadata and containers.
//!
//! Relationships are declared at compile time (via `#[derive(Model)]`) and represented
//! as static metadata on each `Model`. The session uses that metadata to generate the
//! SQL that loads related rows and to order inserts so foreign keys are filled in.
//!
//! The in-memory side lives in two containers:
//!
//! - [`RelatedMany`] for one-to-many and many-to-many collections
//! - [`Related`] for many-to-one references and single-valued reverse accessors
//!
//! Both implement [`RelationSlot`], the object-safe interface the session drives
//! without knowing the related type.

use std::fmt;

use crate::error::Result;
use crate::model::{AnyModel, Model};
use crate::row::Row;

/// The type of relationship between two models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelationshipKind {
    /// One-to-one: the related table holds a foreign key back to us, at most one row.
    OneToOne,
    /// Many-to-one: we hold a foreign key to one related row.
    #[default]
    ManyToOne,
    /// One-to-many: the related table holds a foreign key back to us.
    OneToMany,
    /// Many-to-many through a link table.
    ManyToMany,
}

impl RelationshipKind {
    /// Parse the spelling used in derive attributes (`one_to_many`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one_to_one" => Some(RelationshipKind::OneToOne),
            "many_to_one" => Some(RelationshipKind::ManyToOne),
            "one_to_many" => Some(RelationshipKind::OneToMany),
            "many_to_many" => Some(RelationshipKind::ManyToMany),
            _ => None,
        }
    }

    /// Whether the relationship yields a collection.
    pub const fn is_collection(self) -> bool {
        matches!(
            self,
            RelationshipKind::OneToMany | RelationshipKind::ManyToMany
        )
    }
}

/// Information about a link table for many-to-many relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTableInfo {
    /// The link table name (e.g., `"contact_person_number"`).
    pub table_name: &'static str,

    /// Column in link table pointing to the local model (e.g., `"contact_id"`).
    pub local_column: &'static str,

    /// Column in link table pointing to the remote model (e.g., `"phone_number_id"`).
    pub remote_column: &'static str,
}

impl LinkTableInfo {
    #[must_use]
    pub const fn new(
        table_name: &'static str,
        local_column: &'static str,
        remote_column: &'static str,
    ) -> Self {
        Self {
            table_name,
            local_column,
            remote_column,
        }
    }
}

/// Metadata about a relationship between models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipInfo {
    /// Name of the relationship field.
    pub name: &'static str,

    /// The related model's table name.
    pub related_table: &'static str,

    /// The related model's primary key column.
    pub related_key: &'static str,

    pub kind: RelationshipKind,

    /// Local foreign key column (ManyToOne), e.g. `"contact_id"` on `Address`.
    pub local_key: Option<&'static str>,

    /// Foreign key column on the related table (OneToMany / OneToOne).
    pub remote_key: Option<&'static str>,

    /// Link table for ManyToMany relationships.
    pub link_table: Option<LinkTableInfo>,

    /// The field on the related model that points back.
    pub back_populates: Option<&'static str>,

    /// Delete related rows when the owner is deleted (instead of detaching them).
    pub cascade_delete: bool,
}

impl RelationshipInfo {
    #[must_use]
    pub const fn new(
        name: &'static str,
        related_table: &'static str,
        related_key: &'static str,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            name,
            related_table,
            related_key,
            kind,
            local_key: None,
            remote_key: None,
            link_table: None,
            back_populates: None,
            cascade_delete: false,
        }
    }

    #[must_use]
    pub const fn local_key(mut self, key: &'static str) -> Self {
        self.local_key = Some(key);
        self
    }

    #[must_use]
    pub const fn remote_key(mut self, key: &'static str) -> Self {
        self.remote_key = Some(key);
        self
    }

    #[must_use]
    pub const fn link_table(mut self, info: LinkTableInfo) -> Self {
        self.link_table = Some(info);
        self
    }

    #[must_use]
    pub const fn back_populates(mut self, field: &'static str) -> Self {
        self.back_populates = Some(field);
        self
    }

    #[must_use]
    pub const fn cascade_delete(mut self, value: bool) -> Self {
        self.cascade_delete = value;
        self
    }
}

/// Find a relationship by field name.
pub fn find_relationship(
    relationships: &'static [RelationshipInfo],
    name: &str,
) -> Option<&'static RelationshipInfo> {
    relationships.iter().find(|r| r.name == name)
}

/// Object-safe view of a relationship container.
pub trait RelationSlot {
    /// Replace loaded contents with models built from `rows`.
    ///
    /// Items appended since the last flush are kept.
    fn load_rows(&mut self, rows: &[Row]) -> Result<()>;

    /// Every item currently held.
    fn items_mut(&mut self) -> Vec<&mut dyn AnyModel>;

    /// Items added or assigned since the last flush.
    fn unsynced_mut(&mut self) -> Vec<&mut dyn AnyModel>;

    fn has_unsynced(&self) -> bool;

    /// Record that every held item has been written.
    fn mark_synced(&mut self);

    /// Drop items added or assigned since the last flush.
    fn discard_unsynced(&mut self);

    fn is_loaded(&self) -> bool;
}

/// A collection-valued relationship (one-to-many, many-to-many).
///
/// Pushing onto the collection stages the item; the session writes it, together with
/// its foreign key or link row, on the next flush.
#[derive(Clone, PartialEq)]
pub struct RelatedMany<T> {
    items: Vec<T>,
    /// Items before this index have been written.
    synced: usize,
    loaded: bool,
}

impl<T> RelatedMany<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            synced: 0,
            loaded: false,
        }
    }

    /// Append an item; it is written on the next flush.
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Whether the collection was loaded from the database.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Number of items not yet written.
    pub fn pending_count(&self) -> usize {
        self.items.len() - self.synced
    }
}

impl<T> Default for RelatedMany<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for RelatedMany<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T> FromIterator<T> for RelatedMany<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            synced: 0,
            loaded: false,
        }
    }
}

impl<'a, T> IntoIterator for &'a RelatedMany<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Model> RelationSlot for RelatedMany<T> {
    fn load_rows(&mut self, rows: &[Row]) -> Result<()> {
        let pending = self.items.split_off(self.synced);
        self.items = rows.iter().map(T::from_row).collect::<Result<Vec<_>>>()?;
        self.synced = self.items.len();
        self.items.extend(pending);
        self.loaded = true;
        Ok(())
    }

    fn items_mut(&mut self) -> Vec<&mut dyn AnyModel> {
        self.items
            .iter_mut()
            .map(|item| item as &mut dyn AnyModel)
            .collect()
    }

    fn unsynced_mut(&mut self) -> Vec<&mut dyn AnyModel> {
        self.items[self.synced..]
            .iter_mut()
            .map(|item| item as &mut dyn AnyModel)
            .collect()
    }

    fn has_unsynced(&self) -> bool {
        self.synced < self.items.len()
    }

    fn mark_synced(&mut self) {
        self.synced = self.items.len();
    }

    fn discard_unsynced(&mut self) {
        self.items.truncate(self.synced);
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// A single-valued relationship (many-to-one, or a one-to-one reverse accessor).
#[derive(Clone, PartialEq)]
pub struct Related<T> {
    value: Option<Box<T>>,
    loaded: bool,
    /// Assigned since the last flush.
    dirty: bool,
}

impl<T> Related<T> {
    /// An unloaded, empty reference.
    pub fn empty() -> Self {
        Self {
            value: None,
            loaded: false,
            dirty: false,
        }
    }

    /// A reference to `value`; the foreign key is filled in on flush.
    pub fn new(value: T) -> Self {
        Self {
            value: Some(Box::new(value)),
            loaded: true,
            dirty: true,
        }
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(Box::new(value));
        self.loaded = true;
        self.dirty = true;
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_deref_mut()
    }

    pub fn is_some(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl<T> Default for Related<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for Related<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.loaded) {
            (Some(v), _) => v.fmt(f),
            (None, true) => f.write_str("None"),
            (None, false) => f.write_str("<not loaded>"),
        }
    }
}

impl<T: Model> RelationSlot for Related<T> {
    fn load_rows(&mut self, rows: &[Row]) -> Result<()> {
        if self.dirty {
            return Ok(());
        }
        self.value = rows.first().map(T::from_row).transpose()?.map(Box::new);
        self.loaded = true;
        Ok(())
    }

    fn items_mut(&mut self) -> Vec<&mut dyn AnyModel> {
        self.value
            .as_deref_mut()
            .map(|v| v as &mut dyn AnyModel)
            .into_iter()
            .collect()
    }

    fn unsynced_mut(&mut self) -> Vec<&mut dyn AnyModel> {
        if self.dirty {
            self.items_mut()
        } else {
            Vec::new()
        }
    }

    fn has_unsynced(&self) -> bool {
        self.dirty && self.value.is_some()
    }

    fn mark_synced(&mut self) {
        self.dirty = false;
    }

    fn discard_unsynced(&mut self) {
        if self.dirty {
            self.value = None;
            self.loaded = false;
            self.dirty = false;
        }
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_kind_default() {
        assert_eq!(RelationshipKind::default(), RelationshipKind::ManyToOne);
        assert_eq!(
            RelationshipKind::parse("many_to_many"),
            Some(RelationshipKind::ManyToMany)
        );
        assert!(RelationshipKind::OneToMany.is_collection());
        assert!(!RelationshipKind::OneToOne.is_collection());
    }

    #[test]
    fn test_relationship_info_builder_chain() {
        let info = RelationshipInfo::new(
            "contact",
            "contact",
            "contact_id",
            RelationshipKind::ManyToOne,
        )
        .local_key("contact_id")
        .back_populates("addresses")
        .cascade_delete(true);

        assert_eq!(info.name, "contact");
        assert_eq!(info.related_key, "contact_id");
        assert_eq!(info.local_key, Some("contact_id"));
        assert_eq!(info.remote_key, None);
        assert_eq!(info.link_table, None);
        assert_eq!(info.back_populates, Some("addresses"));
        assert!(info.cascade_delete);
    }

    #[test]
    fn test_link_table_info_new() {
        let link = LinkTableInfo::new("contact_person_number", "contact_id", "phone_number_id");
        assert_eq!(link.table_name, "contact_person_number");
        assert_eq!(link.local_column, "contact_id");
        assert_eq!(link.remote_column, "phone_number_id");
    }

    #[test]
    fn test_find_relationship() {
        static RELS: &[RelationshipInfo] = &[
            RelationshipInfo::new("addresses", "address", "address_id", RelationshipKind::OneToMany)
                .remote_key("contact_id"),
        ];
        assert!(find_relationship(RELS, "addresses").is_some());
        assert!(find_relationship(RELS, "phones").is_none());
    }

    #[test]
    fn test_related_many_pending_count() {
        let mut many: RelatedMany<i32> = RelatedMany::new();
        assert!(many.is_empty());
        many.push(1);
        many.push(2);
        assert_eq!(many.len(), 2);
        assert_eq!(many.pending_count(), 2);
        assert!(!many.is_loaded());
        assert_eq!(format!("{many:?}"), "[1, 2]");
    }

    #[test]
    fn test_related_debug() {
        let empty: Related<i32> = Related::empty();
        assert_eq!(format!("{empty:?}"), "<not loaded>");
        let set = Related::new(5);
        assert_eq!(format!("{set:?}"), "5");
        assert!(set.is_some());
    }
}
