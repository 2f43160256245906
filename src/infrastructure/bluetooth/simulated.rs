//! In-process radio stack.
//!
//! Answers every command with the completion a real stack would deliver,
//! drawn from a table of simulated devices. Used for bench runs without
//! hardware and for end-to-end tests of the gateway.

use crate::domain::models::{DeviceAddress, SensorDescriptor};
use crate::infrastructure::bluetooth::gatt::{
    Characteristic, CharacteristicProperties, Service, ServiceTree,
};
use crate::infrastructure::bluetooth::protocol::{
    HT_CONFIG_UUID, HT_DATA_UUID, HT_SERVICE_UUID, OPTICAL_CONFIG_UUID, OPTICAL_DATA_UUID,
    OPTICAL_SERVICE_UUID,
};
use crate::infrastructure::bluetooth::radio::{
    Advertisement, GattStatus, LinkHandle, RadioError, RadioEvent, RadioStack,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// ATT "attribute not found"
const ATT_ATTRIBUTE_NOT_FOUND: u16 = 0x0A;

/// Behaviour of one simulated peripheral.
#[derive(Debug, Clone)]
pub enum SimulatedDevice {
    /// Non-connectable sensor that puts its reading in manufacturer data.
    Broadcast { company_id: u16, frame: Vec<u8> },
    /// Connectable sensor exposing a GATT tree with fixed characteristic values.
    Gatt {
        tree: ServiceTree,
        values: HashMap<Uuid, Vec<u8>>,
    },
}

impl SimulatedDevice {
    /// A SensorTag-style device with humidity/temperature and optical services.
    ///
    /// `temperature_raw` and `lux_raw` are the little-endian words the data
    /// characteristics return.
    pub fn sensortag(temperature_raw: u16, lux_raw: u16) -> Self {
        let tree = ServiceTree::new(vec![
            Service::new(HT_SERVICE_UUID)
                .with_characteristic(HT_DATA_UUID, CharacteristicProperties::READ_NOTIFY)
                .with_characteristic(HT_CONFIG_UUID, CharacteristicProperties::READ_WRITE),
            Service::new(OPTICAL_SERVICE_UUID)
                .with_characteristic(OPTICAL_DATA_UUID, CharacteristicProperties::READ_NOTIFY)
                .with_characteristic(OPTICAL_CONFIG_UUID, CharacteristicProperties::READ_WRITE),
        ]);

        let mut ht_value = temperature_raw.to_le_bytes().to_vec();
        ht_value.extend_from_slice(&[0x00, 0x00]);

        let values = HashMap::from([
            (HT_DATA_UUID, ht_value),
            (HT_CONFIG_UUID, vec![0x00]),
            (OPTICAL_DATA_UUID, lux_raw.to_le_bytes().to_vec()),
            (OPTICAL_CONFIG_UUID, vec![0x00]),
        ]);

        Self::Gatt { tree, values }
    }

    /// A broadcast sensor reporting the given tenths of %RH and °C, with a
    /// valid checksum.
    pub fn broadcast(company_id: u16, humidity_tenths: u16, temperature_tenths: i16) -> Self {
        let [h_hi, h_lo] = humidity_tenths.to_be_bytes();
        let [t_hi, t_lo] = temperature_tenths.to_be_bytes();
        let sum = [h_hi, h_lo, t_hi, t_lo]
            .iter()
            .fold(0u8, |acc, b| acc.wrapping_add(*b));

        Self::Broadcast {
            company_id,
            frame: vec![h_hi, h_lo, t_hi, t_lo, sum],
        }
    }
}

struct SimulatedPeripheral {
    descriptor: SensorDescriptor,
    device: SimulatedDevice,
}

impl SimulatedPeripheral {
    fn advertisement(&self) -> Advertisement {
        // Stacks commonly report lower-case addresses
        let advertisement = Advertisement::new(self.descriptor.address.to_string().to_lowercase())
            .with_name(self.descriptor.name.clone());
        match &self.device {
            SimulatedDevice::Broadcast { company_id, frame } => {
                advertisement.with_manufacturer_data(*company_id, frame.clone())
            }
            SimulatedDevice::Gatt { .. } => advertisement,
        }
    }
}

pub struct SimulatedRadio {
    events: mpsc::UnboundedSender<RadioEvent>,
    peripherals: Vec<SimulatedPeripheral>,
    links: HashMap<LinkHandle, DeviceAddress>,
    linked: HashSet<LinkHandle>,
    next_link: u64,
    scanning: bool,
    scans_started: usize,
    available: bool,
}

impl SimulatedRadio {
    /// `events` is the acquisition session's inbox.
    pub fn new(events: mpsc::UnboundedSender<RadioEvent>) -> Self {
        Self {
            events,
            peripherals: Vec::new(),
            links: HashMap::new(),
            linked: HashSet::new(),
            next_link: 1,
            scanning: false,
            scans_started: 0,
            available: true,
        }
    }

    pub fn add_device(&mut self, descriptor: &SensorDescriptor, device: SimulatedDevice) {
        debug!("Simulating {} ({})", descriptor.name, descriptor.address);
        self.peripherals.push(SimulatedPeripheral {
            descriptor: descriptor.clone(),
            device,
        });
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn scans_started(&self) -> usize {
        self.scans_started
    }

    /// Number of links opened and not yet closed.
    pub fn open_links(&self) -> usize {
        self.links.len()
    }

    fn peripheral(&self, address: &DeviceAddress) -> Option<&SimulatedPeripheral> {
        self.peripherals
            .iter()
            .find(|p| p.descriptor.address == *address)
    }

    fn gatt_for(
        &self,
        link: LinkHandle,
    ) -> Result<(&ServiceTree, &HashMap<Uuid, Vec<u8>>), RadioError> {
        if !self.linked.contains(&link) {
            return Err(RadioError::UnknownLink(link));
        }
        let address = self.links.get(&link).ok_or(RadioError::UnknownLink(link))?;
        match self.peripheral(address).map(|p| &p.device) {
            Some(SimulatedDevice::Gatt { tree, values }) => Ok((tree, values)),
            _ => Err(RadioError::UnknownLink(link)),
        }
    }

    fn send(&self, event: RadioEvent) {
        trace!("Simulated completion: {:?}", event);
        let _ = self.events.send(event);
    }
}

impl RadioStack for SimulatedRadio {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start_scan(&mut self) -> Result<(), RadioError> {
        if !self.available {
            return Err(RadioError::Unavailable);
        }
        self.scanning = true;
        self.scans_started += 1;
        for peripheral in &self.peripherals {
            self.send(RadioEvent::AdvertisementReceived(peripheral.advertisement()));
        }
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.scanning = false;
        Ok(())
    }

    fn connect(&mut self, address: &DeviceAddress) -> Result<LinkHandle, RadioError> {
        match self.peripheral(address).map(|p| &p.device) {
            Some(SimulatedDevice::Gatt { .. }) => {}
            Some(SimulatedDevice::Broadcast { .. }) => {
                return Err(RadioError::Rejected(format!("{} is not connectable", address)))
            }
            None => return Err(RadioError::DeviceNotFound(*address)),
        }

        let link = LinkHandle(self.next_link);
        self.next_link += 1;
        self.links.insert(link, *address);
        self.linked.insert(link);
        self.send(RadioEvent::ConnectionStateChanged { link, linked: true });

        Ok(link)
    }

    fn reconnect(&mut self, link: LinkHandle) -> Result<(), RadioError> {
        if !self.links.contains_key(&link) {
            return Err(RadioError::UnknownLink(link));
        }
        self.linked.insert(link);
        self.send(RadioEvent::ConnectionStateChanged { link, linked: true });
        Ok(())
    }

    fn disconnect(&mut self, link: LinkHandle) {
        if self.linked.remove(&link) {
            self.send(RadioEvent::ConnectionStateChanged {
                link,
                linked: false,
            });
        }
    }

    fn close(&mut self, link: LinkHandle) {
        self.linked.remove(&link);
        self.links.remove(&link);
    }

    fn discover_services(&mut self, link: LinkHandle) -> Result<(), RadioError> {
        let (tree, _) = self.gatt_for(link)?;
        let tree = tree.clone();
        self.send(RadioEvent::ServicesDiscovered {
            link,
            result: Ok(tree),
        });
        Ok(())
    }

    fn read_characteristic(
        &mut self,
        link: LinkHandle,
        characteristic: &Characteristic,
    ) -> Result<(), RadioError> {
        let (_, values) = self.gatt_for(link)?;
        let event = match values.get(&characteristic.uuid) {
            Some(value) => RadioEvent::CharacteristicRead {
                link,
                uuid: characteristic.uuid,
                status: GattStatus::Success,
                value: value.clone(),
            },
            None => RadioEvent::CharacteristicRead {
                link,
                uuid: characteristic.uuid,
                status: GattStatus::Failure(ATT_ATTRIBUTE_NOT_FOUND),
                value: Vec::new(),
            },
        };
        self.send(event);
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        link: LinkHandle,
        characteristic: &Characteristic,
        value: &[u8],
    ) -> Result<(), RadioError> {
        self.gatt_for(link)?;
        let address = self.links.get(&link).copied();
        if let Some(SimulatedDevice::Gatt { values, .. }) = address.and_then(|address| {
            self.peripherals
                .iter_mut()
                .find(|p| p.descriptor.address == address)
                .map(|p| &mut p.device)
        }) {
            values.insert(characteristic.uuid, value.to_vec());
        }

        self.send(RadioEvent::CharacteristicWritten {
            link,
            uuid: characteristic.uuid,
            status: GattStatus::Success,
        });
        Ok(())
    }
}
