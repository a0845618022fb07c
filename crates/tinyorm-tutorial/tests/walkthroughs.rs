//! Run each tutorial against a fresh in-memory database and check what it did.

use tinyorm::{Select, Session, SqliteConnection};
use tinyorm_tutorial::{Address, Contact, NetworkDevice, NetworkDeviceVendor, PhoneNumber, walkthrough};

fn session() -> Session<SqliteConnection> {
    let conn = SqliteConnection::open_memory().unwrap();
    tinyorm_tutorial::create_schema(&conn).unwrap();
    Session::new(conn)
}

fn run(
    walk: fn(&mut Session<SqliteConnection>, &mut dyn std::io::Write) -> anyhow::Result<()>,
) -> (Session<SqliteConnection>, Vec<String>) {
    let mut session = session();
    let mut out = Vec::new();
    walk(&mut session, &mut out).unwrap();
    let lines = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    (session, lines)
}

#[test]
fn test_basics() {
    let (session, lines) = run(walkthrough::basics);

    assert_eq!(
        lines[0],
        "<Contact(contact_id=None, first_name=Russell, last_name=Yorke,date_of_birth=1982-01-25 00:00:00)>"
    );
    assert!(lines.contains(&"Total contacts found: 13".to_string()));
    assert!(lines.contains(&"Total contacts returned: 5".to_string()));
    assert!(lines.contains(&"Total Contacts: 13".to_string()));
    assert!(lines.contains(&"Projected 13 rows".to_string()));
    assert!(lines.contains(&"Found 1 contacts to delete".to_string()));
    assert!(
        lines
            .iter()
            .any(|l| l.starts_with("SQL Query: SELECT") && l.ends_with("LIMIT 5 OFFSET 5"))
    );
    assert!(lines.iter().any(|l| l.contains("first_name=Jordan")));

    // Jane was deleted, the invalid contact never made it in.
    let stored = Select::<Contact>::new().all(session.connection()).unwrap();
    assert_eq!(stored.len(), 12);
    assert!(stored.iter().all(|c| c.first_name != "Jane"));
    assert!(stored.iter().any(|c| c.first_name == "Jordan"));
    assert!(stored.iter().all(|c| c.age == Some(18)));
}

#[test]
fn test_basics_reports_invalid_types() {
    let (_, lines) = run(walkthrough::basics);
    let report = lines
        .iter()
        .position(|l| l.ends_with("validation error(s) for contact"))
        .unwrap();
    let fields = &lines[report + 1..];
    assert!(fields.iter().any(|l| l.starts_with("  first_name:")));
    assert!(fields.iter().any(|l| l.starts_with("  age:")));
}

#[test]
fn test_relationships() {
    let (session, lines) = run(walkthrough::relationships);

    assert_eq!(lines[0], "[]");
    assert!(lines[1].starts_with("[<Address(address_id=None, street_number=191"));
    assert!(lines.contains(&"Russell Yorke".to_string()));
    assert!(lines.contains(&"191 Pioneer Ave".to_string()));
    assert!(lines.contains(&"166 Portage Ave E".to_string()));
    assert!(lines.contains(&"  lived in by Russell Yorke".to_string()));
    assert!(lines.contains(&"Contacts living in Winnipeg: 1".to_string()));
    assert!(lines.contains(&"204-555-0199 (Cell) is shared by 2 contacts".to_string()));
    assert!(lines.contains(&"Russell Yorke can be reached at [204-555-0199]".to_string()));

    let addresses = Select::<Address>::new().all(session.connection()).unwrap();
    assert_eq!(addresses.len(), 2);
    let contacts = Select::<Contact>::new().all(session.connection()).unwrap();
    assert_eq!(contacts.len(), 2);
    let numbers = Select::<PhoneNumber>::new().all(session.connection()).unwrap();
    assert_eq!(numbers.len(), 1);
    assert!(numbers[0].phone_number_type_id.is_some());
}

#[test]
fn test_network_devices() {
    let (session, lines) = run(walkthrough::network_devices);

    assert_eq!(
        lines,
        vec![
            "Cisco has network device: true",
            "Juniper has network device: false",
            "demo1 is made by Cisco",
        ]
    );

    let vendors = Select::<NetworkDeviceVendor>::new()
        .all(session.connection())
        .unwrap();
    assert_eq!(vendors.len(), 2);
    let devices = Select::<NetworkDevice>::new()
        .all(session.connection())
        .unwrap();
    assert_eq!(devices.len(), 1);
    let cisco = vendors.iter().find(|v| v.vendor_name == "Cisco").unwrap();
    assert_eq!(devices[0].vendor_id, cisco.vendor_id);
}

#[test]
fn test_walkthroughs_share_one_database() {
    let mut session = session();
    let mut out = Vec::new();
    walkthrough::basics(&mut session, &mut out).unwrap();
    walkthrough::relationships(&mut session, &mut out).unwrap();
    walkthrough::network_devices(&mut session, &mut out).unwrap();
    // A second basics run deletes the relationships tutorial's Jane as well.
    walkthrough::basics(&mut session, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Found 2 contacts to delete"));
}
