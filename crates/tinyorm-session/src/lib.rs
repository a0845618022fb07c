//! Session and unit of work for tinyorm.
//!
//! The `Session` is the central unit-of-work manager. It owns a database connection,
//! tracks objects, and writes their changes back as one transaction.
//!
//! - **Identity map**: at most one tracked instance per (table, primary key). Query
//!   results and `find` hand back the tracked instance when there is one.
//! - **Change tracking**: new objects are inserted on flush; persistent objects are
//!   compared against the column snapshot taken when they were loaded or last written,
//!   and updated when they differ; deleted objects are removed.
//! - **Relationships**: items pushed onto a `RelatedMany` or assigned to a `Related`
//!   are written together with their owner, with foreign keys and link rows filled in.
//! - **Atomicity**: when a flush or commit fails the transaction is rolled back, new
//!   objects are discarded and modified objects revert to their last written state.
//!
//! # Example
//!
//! ```ignore
//! let mut session = Session::new(SqliteConnection::open_memory()?);
//!
//! // Stage a new object; it is INSERTed on the next flush
//! let jane = session.add(Contact::new("Jane", "Doe"));
//!
//! // Write everything and commit
//! session.commit()?;
//!
//! // Change a tracked object; the session notices on its own
//! session.get_mut(&jane)?.first_name = "Janet".to_string();
//! session.commit()?;
//!
//! // Query through the identity map
//! let does = session.query::<Contact>().filter_by("last_name", "Doe").all()?;
//! ```

mod flush;
pub mod query;

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use flush::{BackReference, ChildEffect, Write};
use tinyorm_core::{AnyModel, Connection, DynamicModel, Error, Model, Result, Row, Value};
use tinyorm_query::{Expr, Select};

pub use query::SessionQuery;

// ============================================================================
// Session Configuration
// ============================================================================

/// Configuration for Session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Begin a transaction before the first write.
    pub auto_begin: bool,
    /// Flush pending changes before running a query.
    pub auto_flush: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_begin: true,
            auto_flush: true,
        }
    }
}

// ============================================================================
// Object Key, State and Handle
// ============================================================================

/// Identity of a persisted row: table plus a hash of the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    table: &'static str,
    pk_hash: u64,
}

impl ObjectKey {
    /// Key of an object; `None` until it has a primary key.
    pub fn of(obj: &dyn AnyModel) -> Option<Self> {
        if obj.pk_is_null() {
            return None;
        }
        Some(Self::from_pk(obj.table(), &obj.pk_values()))
    }

    pub fn from_pk(table: &'static str, pk: &[Value]) -> Self {
        Self {
            table,
            pk_hash: hash_values(pk),
        }
    }
}

/// Hash a slice of values for use as a primary key hash.
fn hash_values(values: &[Value]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for v in values {
        match v {
            Value::Null => 0u8.hash(&mut hasher),
            Value::Bool(b) => {
                1u8.hash(&mut hasher);
                b.hash(&mut hasher);
            }
            Value::BigInt(i) => {
                2u8.hash(&mut hasher);
                i.hash(&mut hasher);
            }
            Value::Double(f) => {
                3u8.hash(&mut hasher);
                f.to_bits().hash(&mut hasher);
            }
            Value::Text(s) => {
                4u8.hash(&mut hasher);
                s.hash(&mut hasher);
            }
            Value::Bytes(b) => {
                5u8.hash(&mut hasher);
                b.hash(&mut hasher);
            }
            Value::Timestamp(ts) => {
                6u8.hash(&mut hasher);
                ts.hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

/// State of a tracked object in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// New object, needs INSERT on flush.
    New,
    /// Persistent object with a row in the database.
    Persistent,
    /// Marked for deletion, or deleted; no longer usable for writes.
    Deleted,
    /// Removed from the session with `expunge`.
    Detached,
}

/// A typed reference to an object tracked by one session.
pub struct Handle<M> {
    id: usize,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Handle<M> {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }
}

impl<M> Clone for Handle<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Handle<M> {}

impl<M> PartialEq for Handle<M> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<M> Eq for Handle<M> {}

impl<M> Hash for Handle<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<M> fmt::Debug for Handle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.id)
    }
}

type Snapshot = Vec<(&'static str, Value)>;

/// A tracked object in the session.
struct TrackedObject {
    object: Box<dyn AnyModel>,
    /// Column values as last loaded or written; `None` for new objects.
    snapshot: Option<Snapshot>,
    state: ObjectState,
}

impl TrackedObject {
    fn is_dirty(&self) -> bool {
        if self.state != ObjectState::Persistent {
            return false;
        }
        let changed = self
            .snapshot
            .as_ref()
            .is_some_and(|snapshot| *snapshot != self.object.row_values());
        changed || self.object.has_unsynced_related()
    }
}

/// How a tracked object looked before the current transaction first wrote it.
struct JournalEntry {
    id: usize,
    before: Box<dyn AnyModel>,
    snapshot: Option<Snapshot>,
    state: ObjectState,
}

// ============================================================================
// Session
// ============================================================================

/// The Session is the central unit-of-work manager.
///
/// It tracks objects loaded from or added to the database and coordinates
/// flushing changes back to the database.
pub struct Session<C: Connection> {
    /// The database connection.
    connection: C,
    config: SessionConfig,
    in_transaction: bool,
    /// Tracked objects, indexed by handle id. Discarded objects leave `None`.
    objects: Vec<Option<TrackedObject>>,
    /// Identity map: ObjectKey -> handle id.
    identity_map: HashMap<ObjectKey, usize>,
    /// Objects awaiting INSERT, in add order.
    pending_new: Vec<usize>,
    /// Objects awaiting DELETE.
    pending_delete: Vec<usize>,
    /// Objects written in the open transaction, for rollback.
    journal: Vec<JournalEntry>,
}

impl<C: Connection> Session<C> {
    /// Create a new session from an existing connection.
    pub fn new(connection: C) -> Self {
        Self::with_config(connection, SessionConfig::default())
    }

    /// Create a new session with custom configuration.
    pub fn with_config(connection: C, config: SessionConfig) -> Self {
        Self {
            connection,
            config,
            in_transaction: false,
            objects: Vec::new(),
            identity_map: HashMap::new(),
            pending_new: Vec::new(),
            pending_delete: Vec::new(),
            journal: Vec::new(),
        }
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Give the connection back, dropping all tracked state.
    pub fn into_connection(self) -> C {
        self.connection
    }

    // ========================================================================
    // Object Tracking
    // ========================================================================

    /// Add an object to the session.
    ///
    /// New objects are INSERTed on the next flush, together with the items staged in
    /// their relationships. An object whose primary key is already tracked replaces
    /// the tracked instance (and cancels a pending delete).
    #[tracing::instrument(level = "debug", skip(self, obj))]
    pub fn add<M: Model>(&mut self, obj: M) -> Handle<M> {
        tracing::info!(
            model = std::any::type_name::<M>(),
            table = M::TABLE_NAME,
            "Adding object to session"
        );
        Handle::new(self.track(Box::new(obj)))
    }

    /// Add several objects at once.
    pub fn add_all<M: Model>(&mut self, objs: impl IntoIterator<Item = M>) -> Vec<Handle<M>> {
        objs.into_iter().map(|obj| self.add(obj)).collect()
    }

    /// Add an untyped row. Its values are validated on flush.
    #[tracing::instrument(level = "debug", skip(self, obj))]
    pub fn add_dynamic(&mut self, obj: DynamicModel) -> Handle<DynamicModel> {
        tracing::info!(table = obj.table(), "Adding dynamic object to session");
        Handle::new(self.track(Box::new(obj)))
    }

    fn track(&mut self, object: Box<dyn AnyModel>) -> usize {
        let key = ObjectKey::of(object.as_ref());

        if let Some(id) = key.and_then(|k| self.identity_map.get(&k).copied()) {
            if let Some(tracked) = self.objects[id].as_mut() {
                tracked.object = object;
                if tracked.state == ObjectState::Deleted {
                    tracked.state = ObjectState::Persistent;
                    self.pending_delete.retain(|&d| d != id);
                }
                return id;
            }
        }

        let id = self.objects.len();
        self.objects.push(Some(TrackedObject {
            object,
            snapshot: None,
            state: ObjectState::New,
        }));
        if let Some(key) = key {
            self.identity_map.insert(key, id);
        }
        self.pending_new.push(id);
        id
    }

    /// Track a row read from the database, or return the instance already tracked.
    pub(crate) fn adopt_row<M: Model>(&mut self, row: &Row) -> Result<usize> {
        let obj = M::from_row(row)?;
        let key = ObjectKey::of(&obj);
        if let Some(id) = key.and_then(|k| self.identity_map.get(&k).copied()) {
            if self.object::<M>(id).is_some() {
                return Ok(id);
            }
        }

        let id = self.objects.len();
        self.objects.push(Some(TrackedObject {
            snapshot: Some(obj.to_row()),
            object: Box::new(obj),
            state: ObjectState::Persistent,
        }));
        if let Some(key) = key {
            self.identity_map.insert(key, id);
        }
        Ok(id)
    }

    pub(crate) fn object<M: AnyModel>(&self, id: usize) -> Option<&M> {
        self.objects
            .get(id)?
            .as_ref()?
            .object
            .as_any()
            .downcast_ref::<M>()
    }

    fn tracked(&self, id: usize) -> Option<&TrackedObject> {
        self.objects
            .get(id)?
            .as_ref()
            .filter(|t| t.state != ObjectState::Detached)
    }

    /// The tracked instance behind a handle.
    pub fn get<M: AnyModel>(&self, handle: &Handle<M>) -> Option<&M> {
        self.tracked(handle.id)?.object.as_any().downcast_ref::<M>()
    }

    /// Mutable access to a tracked instance. Changes are picked up on the next flush.
    ///
    /// Fails for deleted and detached instances.
    pub fn get_mut<M: AnyModel>(&mut self, handle: &Handle<M>) -> Result<&mut M> {
        let tracked = self
            .objects
            .get_mut(handle.id)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::Session("instance is no longer in this session".to_string()))?;
        match tracked.state {
            ObjectState::Deleted => {
                return Err(Error::Session("instance has been deleted".to_string()));
            }
            ObjectState::Detached => {
                return Err(Error::Session("instance is detached".to_string()));
            }
            ObjectState::New | ObjectState::Persistent => {}
        }
        tracked
            .object
            .as_any_mut()
            .downcast_mut::<M>()
            .ok_or_else(|| Error::Session("handle type does not match instance".to_string()))
    }

    pub fn state<M>(&self, handle: &Handle<M>) -> Option<ObjectState> {
        self.objects
            .get(handle.id)?
            .as_ref()
            .map(|t| t.state)
    }

    /// Whether the handle refers to an instance this session still tracks.
    pub fn contains<M>(&self, handle: &Handle<M>) -> bool {
        self.tracked(handle.id).is_some()
    }

    /// Look up an instance by primary key: the identity map first, then the database.
    ///
    /// An instance marked for deletion is not found, even before the delete is flushed.
    #[tracing::instrument(level = "debug", skip(self, pk))]
    pub fn find<M: Model>(&mut self, pk: impl Into<Value>) -> Result<Option<Handle<M>>> {
        let pk = pk.into();
        let key = ObjectKey::from_pk(M::TABLE_NAME, std::slice::from_ref(&pk));
        if let Some(&id) = self.identity_map.get(&key) {
            if let (Some(_), Some(tracked)) = (self.object::<M>(id), self.tracked(id)) {
                if tracked.state == ObjectState::Deleted {
                    return Ok(None);
                }
                return Ok(Some(Handle::new(id)));
            }
        }

        self.autoflush()?;
        let pk_col = M::PRIMARY_KEY
            .first()
            .ok_or_else(|| Error::Session(format!("{} has no primary key", M::TABLE_NAME)))?;
        let rows = Select::<M>::new()
            .filter(Expr::qualified(M::TABLE_NAME, *pk_col).eq(pk))
            .rows(&self.connection)?;
        match rows.first() {
            Some(row) => Ok(Some(Handle::new(self.adopt_row::<M>(row)?))),
            None => Ok(None),
        }
    }

    /// Stop tracking an instance. Pending changes to it are forgotten.
    pub fn expunge<M>(&mut self, handle: &Handle<M>) {
        let id = handle.id;
        if let Some(tracked) = self.objects.get_mut(id).and_then(Option::as_mut) {
            tracked.state = ObjectState::Detached;
            self.identity_map.retain(|_, &mut v| v != id);
        }
        self.pending_new.retain(|&k| k != id);
        self.pending_delete.retain(|&k| k != id);
    }

    /// Detach all objects from the session.
    pub fn expunge_all(&mut self) {
        for tracked in self.objects.iter_mut().flatten() {
            tracked.state = ObjectState::Detached;
        }
        self.identity_map.clear();
        self.pending_new.clear();
        self.pending_delete.clear();
    }

    /// Instances of `M` awaiting INSERT, in add order.
    pub fn new_objects<M: AnyModel>(&self) -> Vec<&M> {
        self.pending_new
            .iter()
            .filter_map(|&id| self.object::<M>(id))
            .collect()
    }

    /// Persistent instances of `M` with unwritten changes.
    pub fn dirty_objects<M: AnyModel>(&self) -> Vec<&M> {
        self.objects
            .iter()
            .flatten()
            .filter(|t| t.is_dirty())
            .filter_map(|t| t.object.as_any().downcast_ref::<M>())
            .collect()
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Mark an instance for deletion, by primary key.
    ///
    /// An instance the session does not track yet is attached first.
    #[tracing::instrument(level = "debug", skip(self, obj))]
    pub fn delete<M: Model>(&mut self, obj: &M) -> Result<()> {
        let key = ObjectKey::of(obj)
            .ok_or_else(|| Error::Session("cannot delete an instance that was never saved".to_string()))?;
        let id = match self.identity_map.get(&key) {
            Some(&id) => id,
            None => {
                let id = self.objects.len();
                self.objects.push(Some(TrackedObject {
                    snapshot: Some(obj.to_row()),
                    object: Box::new(obj.clone()),
                    state: ObjectState::Persistent,
                }));
                self.identity_map.insert(key, id);
                id
            }
        };
        self.delete_id(id)
    }

    /// Mark the instance behind a handle for deletion.
    pub fn delete_handle<M>(&mut self, handle: &Handle<M>) -> Result<()> {
        self.delete_id(handle.id)
    }

    fn delete_id(&mut self, id: usize) -> Result<()> {
        let tracked = self
            .objects
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::Session("instance is no longer in this session".to_string()))?;

        tracing::info!(table = tracked.object.table(), "Marking object for deletion");

        match tracked.state {
            ObjectState::New => {
                // Never written; just forget it.
                self.discard(id);
                Ok(())
            }
            ObjectState::Persistent => {
                tracked.state = ObjectState::Deleted;
                self.pending_delete.push(id);
                Ok(())
            }
            ObjectState::Deleted => Err(Error::Session("instance is already deleted".to_string())),
            ObjectState::Detached => Err(Error::Session("instance is detached".to_string())),
        }
    }

    fn discard(&mut self, id: usize) {
        if let Some(tracked) = self.objects.get_mut(id).and_then(Option::take) {
            if let Some(key) = ObjectKey::of(tracked.object.as_ref()) {
                if self.identity_map.get(&key) == Some(&id) {
                    self.identity_map.remove(&key);
                }
            }
        }
        self.pending_new.retain(|&k| k != id);
        self.pending_delete.retain(|&k| k != id);
    }

    // ========================================================================
    // Transaction Management
    // ========================================================================

    /// Begin a transaction, unless one is open.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            return Ok(());
        }
        tracing::info!("Beginning transaction");
        self.connection.begin()?;
        self.in_transaction = true;
        Ok(())
    }

    pub(crate) fn autoflush(&mut self) -> Result<()> {
        if self.config.auto_flush {
            self.flush()
        } else {
            Ok(())
        }
    }

    /// Write pending changes to the database without committing.
    ///
    /// On failure the transaction is rolled back (see [`Session::rollback`]) and the
    /// error is returned.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn flush(&mut self) -> Result<()> {
        match self.flush_pending() {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Flush failed, rolling back");
                if let Err(rollback_err) = self.rollback() {
                    tracing::warn!(error = %rollback_err, "Rollback after failed flush also failed");
                }
                Err(e)
            }
        }
    }

    fn flush_pending(&mut self) -> Result<()> {
        let dirty: Vec<usize> = self
            .objects
            .iter()
            .enumerate()
            .filter(|(_, t)| t.as_ref().is_some_and(TrackedObject::is_dirty))
            .map(|(id, _)| id)
            .collect();

        if self.pending_new.is_empty() && dirty.is_empty() && self.pending_delete.is_empty() {
            return Ok(());
        }

        let start = std::time::Instant::now();
        tracing::info!(
            inserts = self.pending_new.len(),
            updates = dirty.len(),
            deletes = self.pending_delete.len(),
            "Starting flush"
        );

        if self.config.auto_begin {
            self.begin()?;
        }

        let mut back_refs = Vec::new();

        // The queues stay intact until the whole flush succeeds, so a failure
        // part way through leaves every unwritten id for `revert` to handle.

        // 1. INSERTs, in add order.
        for id in self.pending_new.clone() {
            self.record(id);
            let Some(tracked) = self.objects[id].as_mut() else {
                continue;
            };
            flush::persist(
                &self.connection,
                tracked.object.as_mut(),
                Write::Insert,
                &mut back_refs,
            )?;
            tracked.state = ObjectState::Persistent;
            tracked.snapshot = Some(tracked.object.row_values());
            if let Some(key) = ObjectKey::of(tracked.object.as_ref()) {
                self.identity_map.insert(key, id);
            }
        }

        // 2. UPDATEs of dirty objects and their staged relationship items.
        for id in dirty {
            self.record(id);
            let Some(tracked) = self.objects[id].as_mut() else {
                continue;
            };
            let current = tracked.object.row_values();
            let changed = match &tracked.snapshot {
                Some(snapshot) => {
                    if primary_key_changed(tracked.object.as_ref(), snapshot, &current) {
                        return Err(Error::Session(format!(
                            "primary key of a persistent {} row cannot change",
                            tracked.object.table()
                        )));
                    }
                    *snapshot != current
                }
                None => true,
            };
            let write = if changed { Write::Update } else { Write::Skip };
            flush::persist(
                &self.connection,
                tracked.object.as_mut(),
                write,
                &mut back_refs,
            )?;
            tracked.snapshot = Some(tracked.object.row_values());
        }

        // 3. DELETEs.
        for id in self.pending_delete.clone() {
            self.record(id);
            let Some(tracked) = self.objects[id].as_ref() else {
                continue;
            };
            let effects = flush::delete_row(&self.connection, tracked.object.as_ref())?;
            if let Some(key) = ObjectKey::of(tracked.object.as_ref()) {
                self.identity_map.remove(&key);
            }
            self.apply_child_effects(&effects);
        }

        self.fill_tracked_back_references(&back_refs)?;
        self.pending_new.clear();
        self.pending_delete.clear();

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis(),
            "Flush completed"
        );
        Ok(())
    }

    /// Mirror a delete's effect on tracked children.
    fn apply_child_effects(&mut self, effects: &[ChildEffect]) {
        for effect in effects {
            let affected: Vec<usize> = self
                .objects
                .iter()
                .enumerate()
                .filter_map(|(id, t)| {
                    let t = t.as_ref()?;
                    let matches = t.state == ObjectState::Persistent
                        && t.object.table() == effect.table
                        && t.object.column_value(effect.column).as_ref() == Some(&effect.key);
                    matches.then_some(id)
                })
                .collect();

            for id in affected {
                self.record(id);
                let Some(tracked) = self.objects[id].as_mut() else {
                    continue;
                };
                if effect.deleted {
                    tracked.state = ObjectState::Deleted;
                    if let Some(key) = ObjectKey::of(tracked.object.as_ref()) {
                        self.identity_map.remove(&key);
                    }
                } else {
                    if let Err(e) = tracked.object.assign(effect.column, &Value::Null) {
                        tracing::warn!(error = %e, "Could not clear foreign key on tracked child");
                    }
                    tracked.snapshot = Some(tracked.object.row_values());
                }
            }
        }
    }

    /// Point single-valued back-references of tracked parents at rows written in this flush.
    fn fill_tracked_back_references(&mut self, back_refs: &[BackReference]) -> Result<()> {
        for back_ref in back_refs {
            let key = ObjectKey::from_pk(back_ref.table, std::slice::from_ref(&back_ref.key));
            let Some(&id) = self.identity_map.get(&key) else {
                continue;
            };
            if let Some(tracked) = self.objects[id].as_mut() {
                flush::fill_back_reference(tracked.object.as_mut(), back_ref.field, &back_ref.row)?;
            }
        }
        Ok(())
    }

    /// Remember how `id` looked before this transaction first touched it.
    fn record(&mut self, id: usize) {
        if self.journal.iter().any(|e| e.id == id) {
            return;
        }
        if let Some(tracked) = self.objects[id].as_ref() {
            self.journal.push(JournalEntry {
                id,
                before: tracked.object.clone_boxed(),
                snapshot: tracked.snapshot.clone(),
                state: tracked.state,
            });
        }
    }

    /// Flush and commit the current transaction.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn commit(&mut self) -> Result<()> {
        self.flush()?;

        if self.in_transaction {
            tracing::info!("Committing transaction");
            if let Err(e) = self.connection.commit() {
                tracing::warn!(error = %e, "Commit failed, rolling back");
                if let Err(rollback_err) = self.rollback() {
                    tracing::warn!(error = %rollback_err, "Rollback after failed commit also failed");
                }
                return Err(e);
            }
            self.in_transaction = false;
        }

        self.journal.clear();
        Ok(())
    }

    /// Roll back the current transaction and every change not yet committed.
    ///
    /// New objects are discarded, objects deleted in the transaction come back,
    /// and modified objects revert to their committed column values.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback(&mut self) -> Result<()> {
        tracing::info!("Rolling back transaction");

        let result = if self.in_transaction {
            self.in_transaction = false;
            self.connection.rollback()
        } else {
            Ok(())
        };

        self.revert();
        result
    }

    fn revert(&mut self) {
        // Undo writes made in the transaction.
        for entry in std::mem::take(&mut self.journal).into_iter().rev() {
            if entry.state == ObjectState::New {
                self.discard(entry.id);
                continue;
            }
            // Objects journaled as Deleted were pending delete in this transaction.
            let state = match entry.state {
                ObjectState::Deleted => ObjectState::Persistent,
                state => state,
            };
            if let Some(slot) = self.objects.get_mut(entry.id) {
                *slot = Some(TrackedObject {
                    object: entry.before,
                    snapshot: entry.snapshot,
                    state,
                });
            }
            if let Some(key) = self.objects[entry.id]
                .as_ref()
                .and_then(|t| ObjectKey::of(t.object.as_ref()))
            {
                self.identity_map.insert(key, entry.id);
            }
        }

        // Drop changes that were never written.
        for id in std::mem::take(&mut self.pending_new) {
            self.discard(id);
        }
        for id in std::mem::take(&mut self.pending_delete) {
            if let Some(tracked) = self.objects[id].as_mut() {
                tracked.state = ObjectState::Persistent;
            }
        }
        for tracked in self.objects.iter_mut().flatten() {
            if tracked.state != ObjectState::Persistent {
                continue;
            }
            if let Some(snapshot) = &tracked.snapshot {
                for (column, value) in snapshot {
                    if let Err(e) = tracked.object.assign(column, value) {
                        tracing::warn!(error = %e, column = *column, "Could not restore column");
                    }
                }
            }
            let discarded = tracked.object.visit_related(&mut |_, slot| {
                slot.discard_unsynced();
                Ok(())
            });
            if let Err(e) = discarded {
                tracing::warn!(error = %e, "Could not discard staged relationship items");
            }
        }
    }

    // ========================================================================
    // Querying and Relationships
    // ========================================================================

    /// Start a query for `M`.
    pub fn query<M: Model>(&mut self) -> SessionQuery<'_, M, C> {
        SessionQuery::new(self)
    }

    /// Load relationship `name` of an instance the caller holds.
    #[tracing::instrument(level = "debug", skip(self, obj))]
    pub fn load<M: Model>(&mut self, obj: &mut M, name: &str) -> Result<()> {
        self.autoflush()?;
        flush::load_relationship(&self.connection, obj, name)
    }

    /// Load relationship `name` of a tracked instance.
    #[tracing::instrument(level = "debug", skip(self, handle))]
    pub fn load_handle<M>(&mut self, handle: &Handle<M>, name: &str) -> Result<()> {
        self.autoflush()?;
        let tracked = self
            .objects
            .get_mut(handle.id)
            .and_then(Option::as_mut)
            .filter(|t| t.state != ObjectState::Detached)
            .ok_or_else(|| Error::Session("instance is no longer in this session".to_string()))?;
        flush::load_relationship(&self.connection, tracked.object.as_mut(), name)
    }

    // ========================================================================
    // Debug Diagnostics
    // ========================================================================

    /// Get count of objects pending INSERT.
    pub fn pending_new_count(&self) -> usize {
        self.pending_new.len()
    }

    /// Get count of objects pending DELETE.
    pub fn pending_delete_count(&self) -> usize {
        self.pending_delete.len()
    }

    /// Get count of dirty objects pending UPDATE.
    pub fn pending_dirty_count(&self) -> usize {
        self.objects
            .iter()
            .flatten()
            .filter(|t| t.is_dirty())
            .count()
    }

    /// Get total tracked object count.
    pub fn tracked_count(&self) -> usize {
        self.objects
            .iter()
            .flatten()
            .filter(|t| t.state != ObjectState::Detached)
            .count()
    }

    /// Whether we're in a transaction.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Dump session state for debugging.
    pub fn debug_state(&self) -> SessionDebugInfo {
        SessionDebugInfo {
            tracked: self.tracked_count(),
            pending_new: self.pending_new_count(),
            pending_delete: self.pending_delete_count(),
            pending_dirty: self.pending_dirty_count(),
            in_transaction: self.in_transaction,
        }
    }
}

fn primary_key_changed(obj: &dyn AnyModel, before: &Snapshot, after: &Snapshot) -> bool {
    obj.field_infos()
        .iter()
        .filter(|f| f.primary_key)
        .any(|f| {
            let old = before.iter().find(|(c, _)| *c == f.column_name).map(|(_, v)| v);
            let new = after.iter().find(|(c, _)| *c == f.column_name).map(|(_, v)| v);
            old != new
        })
}

/// Debug information about session state.
#[derive(Debug, Clone)]
pub struct SessionDebugInfo {
    /// Total tracked objects.
    pub tracked: usize,
    /// Objects pending INSERT.
    pub pending_new: usize,
    /// Objects pending DELETE.
    pub pending_delete: usize,
    /// Objects pending UPDATE.
    pub pending_dirty: usize,
    /// Whether in a transaction.
    pub in_transaction: bool,
}

// ============================================================================
// Unit Tests
// ============================================================================
