//! Radio stack contract
//!
//! The host platform owns the actual BLE radio. The acquisition session talks
//! to it through [`RadioStack`]: every method only *issues* a command and
//! returns immediately. Outcomes come back later as [`RadioEvent`]s on the
//! session's event queue, in the order the stack produced them.

use crate::domain::models::DeviceAddress;
use crate::infrastructure::bluetooth::gatt::{Characteristic, ServiceTree};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Opaque handle for one GATT link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkHandle(pub u64);

/// Completion status of a GATT operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    Success,
    Failure(u16),
}

impl GattStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// A command was rejected before it reached the air.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    #[error("radio unavailable")]
    Unavailable,

    #[error("device {0} not found")]
    DeviceNotFound(DeviceAddress),

    #[error("unknown link {0:?}")]
    UnknownLink(LinkHandle),

    #[error("command rejected: {0}")]
    Rejected(String),
}

/// One advertisement observed during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Address exactly as the stack reported it.
    pub address: String,
    pub name: Option<String>,
    /// Manufacturer-specific data keyed by company identifier.
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
}

impl Advertisement {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            manufacturer_data: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_manufacturer_data(mut self, company_id: u16, data: Vec<u8>) -> Self {
        self.manufacturer_data.insert(company_id, data);
        self
    }

    pub fn manufacturer_data(&self, company_id: u16) -> Option<&[u8]> {
        self.manufacturer_data.get(&company_id).map(Vec::as_slice)
    }
}

/// Asynchronous completions delivered to the acquisition session.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEvent {
    AdvertisementReceived(Advertisement),
    ConnectionStateChanged {
        link: LinkHandle,
        linked: bool,
    },
    ServicesDiscovered {
        link: LinkHandle,
        result: Result<ServiceTree, GattStatus>,
    },
    CharacteristicRead {
        link: LinkHandle,
        uuid: Uuid,
        status: GattStatus,
        value: Vec<u8>,
    },
    CharacteristicWritten {
        link: LinkHandle,
        uuid: Uuid,
        status: GattStatus,
    },
    /// Posted by the scan timeout guard, not by the radio.
    ScanTimeout { scan_id: u64 },
}

/// Commands the acquisition session issues to the host radio stack.
///
/// None of these block waiting for the air: completions arrive as
/// [`RadioEvent`]s.
pub trait RadioStack: Send {
    fn is_available(&self) -> bool;

    /// Start an unfiltered advertisement scan.
    fn start_scan(&mut self) -> Result<(), RadioError>;
    fn stop_scan(&mut self) -> Result<(), RadioError>;

    /// Open a new link. State changes follow as `ConnectionStateChanged`.
    fn connect(&mut self, address: &DeviceAddress) -> Result<LinkHandle, RadioError>;
    /// Re-open a link that was dropped but not closed.
    fn reconnect(&mut self, link: LinkHandle) -> Result<(), RadioError>;
    fn disconnect(&mut self, link: LinkHandle);
    /// Release the link. No further events are delivered for it.
    fn close(&mut self, link: LinkHandle);

    fn discover_services(&mut self, link: LinkHandle) -> Result<(), RadioError>;
    fn read_characteristic(
        &mut self,
        link: LinkHandle,
        characteristic: &Characteristic,
    ) -> Result<(), RadioError>;
    fn write_characteristic(
        &mut self,
        link: LinkHandle,
        characteristic: &Characteristic,
        value: &[u8],
    ) -> Result<(), RadioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertisement_builder() {
        let adv = Advertisement::new("24:71:89:08:bd:82")
            .with_name("DHT")
            .with_manufacturer_data(0x0059, vec![1, 2, 3, 4, 10]);
        assert_eq!(adv.name.as_deref(), Some("DHT"));
        assert_eq!(adv.manufacturer_data(0x0059), Some(&[1u8, 2, 3, 4, 10][..]));
        assert_eq!(adv.manufacturer_data(0x004C), None);
    }

    #[test]
    fn test_gatt_status() {
        assert!(GattStatus::Success.is_success());
        assert!(!GattStatus::Failure(133).is_success());
    }
}
