//! The tutorial walkthroughs.
//!
//! Each function runs one tutorial against a session and writes what it sees to
//! `out`. The binaries call them with stdout; tests call them with a buffer.

use std::io::Write;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use tinyorm::{Connection, Dialect, DynamicModel, Expr, OrderBy, Session};

use crate::{Address, Contact, EmailAddress, NetworkDevice, NetworkDeviceVendor, PhoneNumber, PhoneNumberType};

fn born(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn print_contacts(out: &mut dyn Write, contacts: &[Contact]) -> anyhow::Result<()> {
    writeln!(out, "Total contacts found: {}", contacts.len())?;
    for contact in contacts {
        writeln!(out, "{contact}")?;
    }
    Ok(())
}

fn render_list<T: std::fmt::Display>(items: &[T]) -> String {
    let items: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Session lifecycle and query builder on the `contact` table.
pub fn basics<C: Connection>(session: &mut Session<C>, out: &mut dyn Write) -> anyhow::Result<()> {
    // Create a record and stage it
    let new_contact = Contact::new("Russell", "Yorke", born(1982, 1, 25));
    writeln!(out, "{new_contact}")?;
    let russell = session.add(new_contact);

    session.add_all([
        Contact::new("Jane", "Doe", born(1985, 12, 24)),
        Contact::new("John", "Doe", born(1987, 4, 1)),
        Contact::new("Peter", "Piper", born(1992, 8, 1)),
        Contact::new("Jessica", "Jones", born(1992, 8, 1)),
        Contact::new("Mario", "Zonka", born(1992, 8, 1)),
        Contact::new("Luigi", "Rodrigues", born(1992, 8, 1)),
        Contact::new("Shane", "Farris", born(1992, 8, 1)),
        Contact::new("Evita", "Cassella", born(1992, 8, 1)),
        Contact::new("Emmie", "Buchwald", born(1992, 8, 1)),
        Contact::new("Dillion", "Hamm", born(1992, 8, 1)),
        Contact::new("Mitchell", "Endres", born(1992, 8, 1)),
        Contact::new("Chris", "Smyers", born(1992, 8, 1)),
    ]);

    for record in session.new_objects::<Contact>() {
        writeln!(out, "{record}")?;
    }
    let staged = session.pending_new_count();
    session.commit()?;
    tracing::info!(contacts = staged, "Committed new contacts");

    // The session notices the change without another add
    session.get_mut(&russell)?.first_name = "Jordan".to_string();
    for record in session.dirty_objects::<Contact>() {
        writeln!(out, "{record}")?;
    }
    session.commit()?;

    let query = session
        .query::<Contact>()
        .filter_by("first_name", "Jordan")
        .filter_by("last_name", "Yorke");
    writeln!(out, "{query}")?;
    match query.first()? {
        Some(contact) => writeln!(out, "{contact}")?,
        None => writeln!(out, "None")?,
    }

    let contacts = session.query::<Contact>().all()?;
    print_contacts(out, &contacts)?;

    let query = session.query::<Contact>().limit(5).offset(5);
    writeln!(out, "SQL Query: {query}")?;
    let contacts = query.all()?;
    writeln!(out, "Total contacts returned: {}", contacts.len())?;
    for contact in &contacts {
        writeln!(out, "{contact}")?;
    }

    let descending = OrderBy::desc(Expr::qualified("contact", "last_name"));
    writeln!(
        out,
        "Query for descending: {}",
        descending.build_with_dialect(Dialect::Sqlite, &mut Vec::new(), 0)
    )?;
    let total = session
        .query::<Contact>()
        .order_by(descending.clone())
        .count()?;
    writeln!(out, "Total Contacts: {total}")?;
    for contact in session.query::<Contact>().order_by(descending).all()? {
        writeln!(out, "{contact}")?;
    }

    // Projections come back as rows rather than models
    let rows = session
        .query::<Contact>()
        .columns(&["first_name", "last_name"])
        .rows()?;
    writeln!(out, "Projected {} rows", rows.len())?;
    for row in &rows {
        let first_name: String = row.get_named("first_name")?;
        let last_name: String = row.get_named("last_name")?;
        writeln!(out, "{first_name} {last_name}")?;
    }

    let contacts = session
        .query::<Contact>()
        .filter(Expr::col("last_name").eq("Yorke"))
        .all()?;
    print_contacts(out, &contacts)?;
    let contacts = session
        .query::<Contact>()
        .filter(Expr::col("contact_id").ge(3))
        .all()?;
    print_contacts(out, &contacts)?;
    let contacts = session
        .query::<Contact>()
        .filter(Expr::col("last_name").like("%orke"))
        .all()?;
    print_contacts(out, &contacts)?;

    let doomed = session
        .query::<Contact>()
        .filter(Expr::col("first_name").ilike("Jane"))
        .handles()?;
    writeln!(out, "Found {} contacts to delete", doomed.len())?;
    for handle in &doomed {
        session.delete_handle(handle)?;
    }
    session.commit()?;
    tracing::info!(deleted = doomed.len(), "Deleted contacts named Jane");

    // Values of the wrong type never reach the database
    let mut invalid = DynamicModel::for_model::<Contact>();
    invalid.set("first_name", 1);
    invalid.set("last_name", 1);
    invalid.set("date_of_birth", 1);
    invalid.set("age", "hello");
    session.add_dynamic(invalid);
    if let Err(e) = session.commit() {
        tracing::warn!(error = %e, "Contact with invalid values was rejected");
        writeln!(out, "{e}")?;
    }

    Ok(())
}

/// One-to-many, many-to-one and many-to-many traversal.
pub fn relationships<C: Connection>(
    session: &mut Session<C>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut contact = Contact::new("Russell", "Yorke", born(1982, 1, 4));
    writeln!(out, "{}", render_list(contact.addresses.as_slice()))?;
    contact
        .addresses
        .push(Address::new(191, "Pioneer Ave", "Winnipeg", "Manitoba"));
    contact
        .addresses
        .push(Address::new(166, "Portage Ave E", "Winnipeg", "Manitoba"));
    contact
        .email_addresses
        .push(EmailAddress::new("russell.yorke@example.com"));
    writeln!(out, "{}", render_list(contact.addresses.as_slice()))?;

    // One add stages the contact and everything hanging off it
    let russell = session.add(contact);
    for staged in session.new_objects::<Contact>() {
        writeln!(
            out,
            "{staged} with {} addresses and {} e-mail addresses",
            staged.addresses.pending_count(),
            staged.email_addresses.pending_count()
        )?;
    }

    // Querying flushes first. Reruns against the same file find older Russells too,
    // so take the newest.
    let mut contact = session
        .query::<Contact>()
        .filter_by("first_name", "Russell")
        .order_by(OrderBy::desc(Expr::col("contact_id")))
        .first()?
        .context("the contact was not flushed")?;
    writeln!(out, "{} {}", contact.first_name, contact.last_name)?;

    session.load(&mut contact, "addresses")?;
    for address in contact.addresses.iter() {
        writeln!(out, "{} {}", address.street_number, address.street_name)?;
        if let Some(owner) = address.contact.get() {
            writeln!(out, "  lived in by {} {}", owner.first_name, owner.last_name)?;
        }
    }

    let in_winnipeg = session
        .query::<Contact>()
        .join("addresses")?
        .filter(Expr::qualified("address", "city").eq("Winnipeg"))
        .distinct()
        .count()?;
    writeln!(out, "Contacts living in Winnipeg: {in_winnipeg}")?;

    // Phone numbers are shared through contact_person_number
    let cell = session
        .query::<PhoneNumberType>()
        .filter_by("label", "Cell")
        .first()?;
    let cell = match cell {
        Some(cell) => cell,
        None => {
            tracing::info!(label = "Cell", "Creating phone number type");
            let handle = session.add(PhoneNumberType::new("Cell"));
            session.commit()?;
            session.get(&handle).cloned().context("phone number type vanished")?
        }
    };

    session
        .get_mut(&russell)?
        .phone_numbers
        .push(PhoneNumber::new("204-555-0199", cell));
    session.commit()?;

    let number = session
        .get(&russell)
        .and_then(|c| c.phone_numbers.get(0))
        .cloned()
        .context("phone number was not saved")?;
    let mut partner = Contact::new("Jane", "Yorke", born(1984, 6, 2));
    partner.phone_numbers.push(number.clone());
    session.add(partner);
    session.commit()?;

    let mut number = number;
    session.load(&mut number, "contacts")?;
    writeln!(out, "{number} is shared by {} contacts", number.contacts.len())?;
    for owner in number.contacts.iter() {
        writeln!(out, "  {} {}", owner.first_name, owner.last_name)?;
    }

    let mut contact = session.get(&russell).cloned().context("contact vanished")?;
    session.load(&mut contact, "phone_numbers")?;
    writeln!(
        out,
        "{} {} can be reached at {}",
        contact.first_name,
        contact.last_name,
        render_list(contact.phone_numbers.as_slice())
    )?;

    Ok(())
}

/// A many-to-one reference and the single-valued accessor on the other side.
pub fn network_devices<C: Connection>(
    session: &mut Session<C>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut device = NetworkDevice::new("demo1");
    device.vendor.set(NetworkDeviceVendor::new("Cisco"));
    session.add(device);
    session.add(NetworkDeviceVendor::new("Juniper"));
    session.commit()?;
    tracing::info!("Committed network device and vendors");

    let vendors = session
        .query::<NetworkDeviceVendor>()
        .order_by(OrderBy::asc(Expr::col("vendor_id")))
        .handles()?;
    for handle in &vendors {
        session.load_handle(handle, "network_device")?;
        if let Some(vendor) = session.get(handle) {
            writeln!(
                out,
                "{} has network device: {}",
                vendor.vendor_name,
                vendor.has_network_device()
            )?;
        }
    }

    let mut device = session
        .query::<NetworkDevice>()
        .filter_by("device_name", "demo1")
        .one()?;
    session.load(&mut device, "vendor")?;
    if let Some(vendor) = device.vendor.get() {
        writeln!(out, "{} is made by {}", device.device_name, vendor.vendor_name)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_list() {
        let empty: [Address; 0] = [];
        assert_eq!(render_list(&empty), "[]");
        assert_eq!(render_list(&[1, 2]), "[1, 2]");
    }

    #[test]
    fn test_born_is_midnight() {
        let date = born(1982, 1, 25).unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M:%S").to_string(), "1982-01-25 00:00:00");
    }
}
