//! Contacts and the things attached to them.

use std::fmt;

use chrono::NaiveDateTime;
use tinyorm::{Model, Related, RelatedMany};

/// A person in the address book.
#[derive(Model, Debug, Clone, Default)]
#[tinyorm(table = "contact")]
pub struct Contact {
    #[tinyorm(primary_key)]
    pub contact_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDateTime>,
    #[tinyorm(default = "18")]
    pub age: Option<i64>,
    #[tinyorm(relationship(remote_key = "contact_id", back_populates = "contact", cascade_delete))]
    pub addresses: RelatedMany<Address>,
    #[tinyorm(relationship(remote_key = "contact_id", back_populates = "contact", cascade_delete))]
    pub email_addresses: RelatedMany<EmailAddress>,
    #[tinyorm(relationship(
        link_table = "contact_person_number",
        link_local = "contact_id",
        link_remote = "phone_number_id",
        back_populates = "contacts"
    ))]
    pub phone_numbers: RelatedMany<PhoneNumber>,
}

impl Contact {
    pub fn new(first_name: &str, last_name: &str, date_of_birth: Option<NaiveDateTime>) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            date_of_birth,
            ..Self::default()
        }
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Contact(contact_id={}, first_name={}, last_name={},date_of_birth={})>",
            display_opt(self.contact_id.as_ref()),
            self.first_name,
            self.last_name,
            display_opt(
                self.date_of_birth
                    .map(|d| d.format("%Y-%m-%d %H:%M:%S"))
                    .as_ref()
            ),
        )
    }
}

/// A street address.
#[derive(Model, Debug, Clone, Default)]
#[tinyorm(table = "address")]
pub struct Address {
    #[tinyorm(primary_key)]
    pub address_id: Option<i64>,
    pub apartment_number: Option<i64>,
    pub street_number: i64,
    pub street_name: String,
    pub city: String,
    pub province: String,
    #[tinyorm(foreign_key = "contact.contact_id")]
    pub contact_id: Option<i64>,
    #[tinyorm(relationship(local_key = "contact_id", back_populates = "addresses"))]
    pub contact: Related<Contact>,
}

impl Address {
    pub fn new(street_number: i64, street_name: &str, city: &str, province: &str) -> Self {
        Self {
            street_number,
            street_name: street_name.to_string(),
            city: city.to_string(),
            province: province.to_string(),
            ..Self::default()
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Address(address_id={}, street_number={}, street_name={}, city={})>",
            display_opt(self.address_id.as_ref()),
            self.street_number,
            self.street_name,
            self.city,
        )
    }
}

#[derive(Model, Debug, Clone, Default)]
#[tinyorm(table = "email_address")]
pub struct EmailAddress {
    #[tinyorm(primary_key)]
    pub email_address_id: Option<i64>,
    #[tinyorm(email)]
    pub email: String,
    #[tinyorm(foreign_key = "contact.contact_id")]
    pub contact_id: Option<i64>,
    #[tinyorm(relationship(local_key = "contact_id", back_populates = "email_addresses"))]
    pub contact: Related<Contact>,
}

impl EmailAddress {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            ..Self::default()
        }
    }
}

/// Label for a phone number ("Cell", "Home", ...).
#[derive(Model, Debug, Clone, Default)]
#[tinyorm(table = "phone_number_type")]
pub struct PhoneNumberType {
    #[tinyorm(primary_key)]
    pub phone_number_type_id: Option<i64>,
    pub label: String,
}

impl PhoneNumberType {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }
}

/// A phone number, shared by any number of contacts.
#[derive(Model, Debug, Clone, Default)]
#[tinyorm(table = "phone_number")]
pub struct PhoneNumber {
    #[tinyorm(primary_key)]
    pub phone_number_id: Option<i64>,
    pub phone: String,
    #[tinyorm(foreign_key = "phone_number_type.phone_number_type_id")]
    pub phone_number_type_id: Option<i64>,
    #[tinyorm(relationship(local_key = "phone_number_type_id"))]
    pub phone_number_type: Related<PhoneNumberType>,
    #[tinyorm(relationship(
        link_table = "contact_person_number",
        link_local = "phone_number_id",
        link_remote = "contact_id",
        back_populates = "phone_numbers"
    ))]
    pub contacts: RelatedMany<Contact>,
}

impl PhoneNumber {
    /// A number of the given type. A saved type is referenced, an unsaved one is
    /// inserted along with the number.
    pub fn new(phone: &str, phone_number_type: PhoneNumberType) -> Self {
        Self {
            phone: phone.to_string(),
            phone_number_type: Related::new(phone_number_type),
            ..Self::default()
        }
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phone_number_type.get() {
            Some(kind) => write!(f, "{} ({})", self.phone, kind.label),
            None => f.write_str(&self.phone),
        }
    }
}

fn display_opt<T: fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "None".to_string(), ToString::to_string)
}
