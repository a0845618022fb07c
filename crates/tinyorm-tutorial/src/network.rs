//! Network devices and their vendors.

use tinyorm::{Model, Related};

#[derive(Model, Debug, Clone, Default)]
#[tinyorm(table = "networkdevice")]
pub struct NetworkDevice {
    #[tinyorm(primary_key)]
    pub device_id: Option<i64>,
    #[tinyorm(max_length = 50)]
    pub device_name: String,
    #[tinyorm(foreign_key = "networkdevicevendor.vendor_id")]
    pub vendor_id: Option<i64>,
    #[tinyorm(relationship(local_key = "vendor_id", back_populates = "network_device"))]
    pub vendor: Related<NetworkDeviceVendor>,
}

impl NetworkDevice {
    pub fn new(device_name: &str) -> Self {
        Self {
            device_name: device_name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Model, Debug, Clone, Default)]
#[tinyorm(table = "networkdevicevendor")]
pub struct NetworkDeviceVendor {
    #[tinyorm(primary_key)]
    pub vendor_id: Option<i64>,
    #[tinyorm(max_length = 50)]
    pub vendor_name: String,
    /// The vendor's device, if any.
    #[tinyorm(relationship(remote_key = "vendor_id"))]
    pub network_device: Related<NetworkDevice>,
}

impl NetworkDeviceVendor {
    pub fn new(vendor_name: &str) -> Self {
        Self {
            vendor_name: vendor_name.to_string(),
            ..Self::default()
        }
    }

    /// Whether a device references this vendor. Load `network_device` first.
    pub fn has_network_device(&self) -> bool {
        self.network_device.is_some()
    }
}
