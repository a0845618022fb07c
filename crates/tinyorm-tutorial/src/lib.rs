//! Models and helpers shared by the tutorial programs.
//!
//! - `basics`: one table, the session lifecycle and the query builder
//! - `relationships`: contacts with addresses, e-mail addresses and phone numbers
//! - `network-devices`: a many-to-one reference and its single-valued reverse side

pub mod cli;
pub mod contact;
pub mod network;
pub mod walkthrough;

use tinyorm::{Connection, Result, SchemaBuilder};

pub use contact::{Address, Contact, EmailAddress, PhoneNumber, PhoneNumberType};
pub use network::{NetworkDevice, NetworkDeviceVendor};

/// Every table the tutorials use.
pub fn schema() -> SchemaBuilder {
    SchemaBuilder::new()
        .create_table::<Contact>()
        .create_table::<Address>()
        .create_table::<EmailAddress>()
        .create_table::<PhoneNumberType>()
        .create_table::<PhoneNumber>()
        .create_table::<NetworkDeviceVendor>()
        .create_table::<NetworkDevice>()
}

/// Create any tutorial table that does not exist yet.
pub fn create_schema<C: Connection + ?Sized>(conn: &C) -> Result<()> {
    schema().create_all(conn)
}
