//! Session behavior against an in-memory SQLite database.

use tinyorm_core::{Connection, DynamicModel, Error, Model, Related, RelatedMany};
use tinyorm_macros::Model;
use tinyorm_query::{Expr, OrderBy, Select};
use tinyorm_schema::SchemaBuilder;
use tinyorm_session::{ObjectState, Session};
use tinyorm_sqlite::SqliteConnection;

#[derive(Model, Debug, Clone, Default)]
#[tinyorm(table = "contact")]
struct Contact {
    #[tinyorm(primary_key)]
    contact_id: Option<i64>,
    first_name: String,
    last_name: String,
    #[tinyorm(relationship(remote_key = "contact_id", back_populates = "contact", cascade_delete))]
    addresses: RelatedMany<Address>,
    #[tinyorm(relationship(
        link_table = "contact_person_number",
        link_local = "contact_id",
        link_remote = "phone_number_id"
    ))]
    phone_numbers: RelatedMany<PhoneNumber>,
}

impl Contact {
    fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Model, Debug, Clone, Default)]
#[tinyorm(table = "address")]
struct Address {
    #[tinyorm(primary_key)]
    address_id: Option<i64>,
    street_name: String,
    #[tinyorm(foreign_key = "contact.contact_id")]
    contact_id: Option<i64>,
    #[tinyorm(relationship(local_key = "contact_id", back_populates = "addresses"))]
    contact: Related<Contact>,
}

impl Address {
    fn new(street_name: &str) -> Self {
        Self {
            street_name: street_name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Model, Debug, Clone, Default)]
#[tinyorm(table = "phone_number")]
struct PhoneNumber {
    #[tinyorm(primary_key)]
    phone_number_id: Option<i64>,
    number: String,
}

fn session() -> Session<SqliteConnection> {
    let conn = SqliteConnection::open_memory().unwrap();
    SchemaBuilder::new()
        .create_table::<Contact>()
        .create_table::<Address>()
        .create_table::<PhoneNumber>()
        .create_all(&conn)
        .unwrap();
    Session::new(conn)
}

fn stored<M: Model>(session: &Session<SqliteConnection>) -> Vec<M> {
    Select::<M>::new().all(session.connection()).unwrap()
}

#[test]
fn test_commit_inserts_every_added_object() {
    let mut session = session();
    let handles = session.add_all([
        Contact::new("Jane", "Doe"),
        Contact::new("John", "Doe"),
        Contact::new("Amy", "Smith"),
    ]);
    assert_eq!(session.pending_new_count(), 3);

    session.commit().unwrap();

    assert_eq!(session.pending_new_count(), 0);
    assert!(!session.in_transaction());
    for handle in &handles {
        assert_eq!(session.state(handle), Some(ObjectState::Persistent));
        assert!(session.get(handle).unwrap().contact_id.is_some());
    }
    assert_eq!(stored::<Contact>(&session).len(), 3);
    assert_eq!(session.query::<Contact>().count().unwrap(), 3);
}

#[test]
fn test_modified_object_is_updated() {
    let mut session = session();
    let jane = session.add(Contact::new("Jane", "Doe"));
    session.commit().unwrap();

    session.get_mut(&jane).unwrap().first_name = "Janet".to_string();
    assert_eq!(session.pending_dirty_count(), 1);
    assert_eq!(session.dirty_objects::<Contact>().len(), 1);
    session.commit().unwrap();

    assert_eq!(session.pending_dirty_count(), 0);
    let rows = stored::<Contact>(&session);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].first_name, "Janet");
}

#[test]
fn test_deleted_object_is_removed() {
    let mut session = session();
    let jane = session.add(Contact::new("Jane", "Doe"));
    let john = session.add(Contact::new("John", "Doe"));
    session.commit().unwrap();

    session.delete_handle(&jane).unwrap();
    assert_eq!(session.pending_delete_count(), 1);
    session.commit().unwrap();

    assert_eq!(session.state(&jane), Some(ObjectState::Deleted));
    assert!(session.get_mut(&jane).is_err());
    let rows = stored::<Contact>(&session);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].contact_id, session.get(&john).unwrap().contact_id);
}

#[test]
fn test_delete_by_value_attaches_untracked_object() {
    let mut session = session();
    session.add(Contact::new("Jane", "Doe"));
    session.commit().unwrap();

    let loaded = stored::<Contact>(&session).remove(0);
    session.expunge_all();
    session.delete(&loaded).unwrap();
    session.commit().unwrap();

    assert!(stored::<Contact>(&session).is_empty());
}

#[test]
fn test_deleting_new_object_forgets_it() {
    let mut session = session();
    let jane = session.add(Contact::new("Jane", "Doe"));
    session.delete_handle(&jane).unwrap();
    assert!(!session.contains(&jane));
    session.commit().unwrap();
    assert!(stored::<Contact>(&session).is_empty());
}

#[test]
fn test_children_get_foreign_key_and_back_reference() {
    let mut session = session();
    let mut jane = Contact::new("Jane", "Doe");
    jane.addresses.push(Address::new("Main Street"));
    jane.addresses.push(Address::new("Side Street"));
    let jane = session.add(jane);
    session.commit().unwrap();

    let contact = session.get(&jane).unwrap();
    assert_eq!(contact.addresses.pending_count(), 0);
    for address in contact.addresses.iter() {
        assert!(address.address_id.is_some());
        assert_eq!(address.contact_id, contact.contact_id);
        assert_eq!(
            address.contact.get().unwrap().contact_id,
            contact.contact_id
        );
    }

    let rows = stored::<Address>(&session);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|a| a.contact_id == contact.contact_id));
}

#[test]
fn test_child_added_to_persistent_parent() {
    let mut session = session();
    let jane = session.add(Contact::new("Jane", "Doe"));
    session.commit().unwrap();

    session
        .get_mut(&jane)
        .unwrap()
        .addresses
        .push(Address::new("Main Street"));
    assert_eq!(session.pending_dirty_count(), 1);
    session.commit().unwrap();

    let rows = stored::<Address>(&session);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].contact_id, session.get(&jane).unwrap().contact_id);
}

#[test]
fn test_unsaved_parent_is_inserted_before_child() {
    let mut session = session();
    let address = Address {
        contact: Related::new(Contact::new("Jane", "Doe")),
        ..Address::new("Main Street")
    };
    let address = session.add(address);
    session.commit().unwrap();

    let address = session.get(&address).unwrap();
    let contacts = stored::<Contact>(&session);
    assert_eq!(contacts.len(), 1);
    assert_eq!(address.contact_id, contacts[0].contact_id);
    assert_eq!(address.contact.get().unwrap().contact_id, contacts[0].contact_id);
}

#[test]
fn test_cascade_delete_removes_children() {
    let mut session = session();
    let mut jane = Contact::new("Jane", "Doe");
    jane.addresses.push(Address::new("Main Street"));
    let jane = session.add(jane);
    session.commit().unwrap();
    assert_eq!(stored::<Address>(&session).len(), 1);

    session.delete_handle(&jane).unwrap();
    session.commit().unwrap();

    assert!(stored::<Contact>(&session).is_empty());
    assert!(stored::<Address>(&session).is_empty());
}

#[test]
fn test_filter_without_matches_is_empty() {
    let mut session = session();
    session.add(Contact::new("Jane", "Doe"));
    session.commit().unwrap();

    let nobody = session
        .query::<Contact>()
        .filter_by("last_name", "Nobody")
        .all()
        .unwrap();
    assert!(nobody.is_empty());
    assert!(
        session
            .query::<Contact>()
            .filter_by("last_name", "Nobody")
            .first()
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_invalid_object_fails_commit_and_reverts() {
    let mut session = session();
    let jane = session.add(Contact::new("Jane", "Doe"));
    session.commit().unwrap();

    session.get_mut(&jane).unwrap().first_name = "Janet".to_string();
    let mut bogus = DynamicModel::for_model::<Contact>();
    bogus.set("first_name", "Bob");
    bogus.set("last_name", "Bogus");
    bogus.set("nickname", "bobby");
    session.add_dynamic(bogus);

    let err = session.commit().unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert!(!session.in_transaction());
    assert_eq!(session.pending_new_count(), 0);
    assert_eq!(session.get(&jane).unwrap().first_name, "Jane");
    let rows = stored::<Contact>(&session);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].first_name, "Jane");
}

#[test]
fn test_rollback_discards_new_objects() {
    let mut session = session();
    let jane = session.add(Contact::new("Jane", "Doe"));
    session.flush().unwrap();
    assert!(session.in_transaction());
    assert_eq!(session.query::<Contact>().count().unwrap(), 1);

    session.rollback().unwrap();

    assert!(!session.contains(&jane));
    assert_eq!(session.tracked_count(), 0);
    assert_eq!(session.query::<Contact>().count().unwrap(), 0);
}

#[test]
fn test_rollback_restores_deleted_objects() {
    let mut session = session();
    let jane = session.add(Contact::new("Jane", "Doe"));
    session.commit().unwrap();

    session.delete_handle(&jane).unwrap();
    session.flush().unwrap();
    session.rollback().unwrap();

    assert_eq!(session.state(&jane), Some(ObjectState::Persistent));
    assert_eq!(stored::<Contact>(&session).len(), 1);
}

#[test]
fn test_failed_insert_discards_objects_staged_after_it() {
    let mut session = session();
    let ann = session.add(Contact::new("Ann", "Lee"));
    let mut bogus = DynamicModel::for_model::<Contact>();
    bogus.set("first_name", 1);
    bogus.set("last_name", "Bogus");
    session.add_dynamic(bogus);
    let cid = session.add(Contact::new("Cid", "Lee"));

    assert!(session.commit().is_err());

    assert_eq!(session.state(&ann), None);
    assert_eq!(session.state(&cid), None);
    assert_eq!(session.pending_new_count(), 0);
    assert_eq!(session.tracked_count(), 0);

    // Nothing staged before the failure comes back on the next commit.
    session.commit().unwrap();
    assert!(stored::<Contact>(&session).is_empty());

    let dee = session.add(Contact::new("Dee", "Lee"));
    session.commit().unwrap();
    assert_eq!(session.state(&dee), Some(ObjectState::Persistent));
    assert_eq!(stored::<Contact>(&session).len(), 1);
}

#[test]
fn test_failed_delete_restores_objects_queued_after_it() {
    let mut session = session();
    let ann = session.add(Contact::new("Ann", "Lee"));
    let bob = session.add(Contact::new("Bob", "Lee"));
    session.commit().unwrap();

    let ann_id = session.get(&ann).unwrap().contact_id.unwrap();
    session
        .connection()
        .execute(
            "CREATE TABLE pin (contact_id INTEGER NOT NULL REFERENCES contact(contact_id))",
            &[],
        )
        .unwrap();
    session
        .connection()
        .execute("INSERT INTO pin (contact_id) VALUES (?1)", &[ann_id.into()])
        .unwrap();

    session.delete_handle(&ann).unwrap();
    session.delete_handle(&bob).unwrap();
    let err = session.commit().unwrap_err();
    assert!(matches!(err, Error::Constraint { .. }));

    assert_eq!(session.state(&ann), Some(ObjectState::Persistent));
    assert_eq!(session.state(&bob), Some(ObjectState::Persistent));
    assert_eq!(session.pending_delete_count(), 0);
    assert!(session.get_mut(&bob).is_ok());
    assert_eq!(stored::<Contact>(&session).len(), 2);

    session.delete_handle(&bob).unwrap();
    session.commit().unwrap();
    let rows = stored::<Contact>(&session);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].contact_id, Some(ann_id));
}

#[test]
fn test_find_skips_instance_marked_for_deletion() {
    let mut session = session();
    let jane = session.add(Contact::new("Jane", "Doe"));
    session.commit().unwrap();
    let id = session.get(&jane).unwrap().contact_id.unwrap();

    session.delete_handle(&jane).unwrap();
    assert_eq!(session.find::<Contact>(id).unwrap(), None);

    session.rollback().unwrap();
    assert_eq!(session.find::<Contact>(id).unwrap(), Some(jane));
}

#[test]
fn test_query_autoflushes_pending_objects() {
    let mut session = session();
    session.add(Contact::new("Jane", "Doe"));
    let found = session
        .query::<Contact>()
        .filter_by("first_name", "Jane")
        .one()
        .unwrap();
    assert!(found.contact_id.is_some());
}

#[test]
fn test_identity_map_returns_tracked_instance() {
    let mut session = session();
    let jane = session.add(Contact::new("Jane", "Doe"));
    session.commit().unwrap();

    let handles = session.query::<Contact>().handles().unwrap();
    assert_eq!(handles, vec![jane]);

    let id = session.get(&jane).unwrap().contact_id.unwrap();
    assert_eq!(session.find::<Contact>(id).unwrap(), Some(jane));
    assert_eq!(session.find::<Contact>(id + 100).unwrap(), None);

    // Unflushed edits are visible through query results.
    session.get_mut(&jane).unwrap().last_name = "Roe".to_string();
    let tracked = session.query::<Contact>().all().unwrap();
    assert_eq!(tracked[0].last_name, "Roe");
}

#[test]
fn test_query_ordering_and_paging() {
    let mut session = session();
    session.add_all([
        Contact::new("Cleo", "A"),
        Contact::new("Abe", "B"),
        Contact::new("Bea", "C"),
    ]);
    session.commit().unwrap();

    let names: Vec<String> = session
        .query::<Contact>()
        .order_by(OrderBy::asc(Expr::col("first_name")))
        .offset(1)
        .limit(2)
        .all()
        .unwrap()
        .into_iter()
        .map(|c| c.first_name)
        .collect();
    assert_eq!(names, vec!["Bea", "Cleo"]);

    let err = session.query::<Contact>().one().unwrap_err();
    assert!(matches!(err, Error::MultipleRows(3)));
}

#[test]
fn test_join_filters_on_related_table() {
    let mut session = session();
    let mut jane = Contact::new("Jane", "Doe");
    jane.addresses.push(Address::new("Main Street"));
    jane.addresses.push(Address::new("Main Street"));
    session.add(jane);
    session.add(Contact::new("John", "Doe"));
    session.commit().unwrap();

    let on_main = session
        .query::<Contact>()
        .join("addresses")
        .unwrap()
        .filter(Expr::qualified("address", "street_name").eq("Main Street"))
        .all()
        .unwrap();
    assert_eq!(on_main.len(), 1);
    assert_eq!(on_main[0].first_name, "Jane");
}

#[test]
fn test_many_to_many_writes_link_rows() {
    let mut session = session();
    let mut jane = Contact::new("Jane", "Doe");
    jane.phone_numbers.push(PhoneNumber {
        number: "555-0100".to_string(),
        ..PhoneNumber::default()
    });
    session.add(jane);
    session.commit().unwrap();

    let links = session
        .connection()
        .query("SELECT * FROM contact_person_number", &[])
        .unwrap();
    assert_eq!(links.len(), 1);

    let mut loaded = stored::<Contact>(&session).remove(0);
    session.load(&mut loaded, "phone_numbers").unwrap();
    assert!(loaded.phone_numbers.is_loaded());
    assert_eq!(loaded.phone_numbers.len(), 1);
    assert_eq!(loaded.phone_numbers.get(0).unwrap().number, "555-0100");
}

#[test]
fn test_load_fills_back_references() {
    let mut session = session();
    let mut jane = Contact::new("Jane", "Doe");
    jane.addresses.push(Address::new("Main Street"));
    session.add(jane);
    session.commit().unwrap();
    session.expunge_all();

    let mut contact = session.query::<Contact>().one().unwrap();
    assert!(!contact.addresses.is_loaded());
    session.load(&mut contact, "addresses").unwrap();
    let address = contact.addresses.get(0).unwrap();
    assert_eq!(address.street_name, "Main Street");
    assert_eq!(address.contact.get().unwrap().first_name, "Jane");

    let err = session.load(&mut contact, "pets").unwrap_err();
    assert!(matches!(err, Error::Relationship(_)));
}

#[test]
fn test_debug_state_reflects_pending_work() {
    let mut session = session();
    session.add(Contact::new("Jane", "Doe"));
    let info = session.debug_state();
    assert_eq!(info.tracked, 1);
    assert_eq!(info.pending_new, 1);
    assert_eq!(info.pending_delete, 0);
    assert!(!info.in_transaction);
}
