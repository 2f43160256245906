//! GATT service tree and characteristic lookup.

use std::sync::Arc;
use uuid::Uuid;

/// Capability flags of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacteristicProperties {
    pub readable: bool,
    pub writable: bool,
    pub notifiable: bool,
}

impl CharacteristicProperties {
    pub const READ: Self = Self {
        readable: true,
        writable: false,
        notifiable: false,
    };
    pub const READ_WRITE: Self = Self {
        readable: true,
        writable: true,
        notifiable: false,
    };
    pub const READ_NOTIFY: Self = Self {
        readable: true,
        writable: false,
        notifiable: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    /// UUID of the service this characteristic was discovered under.
    pub service_uuid: Uuid,
    pub properties: CharacteristicProperties,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub uuid: Uuid,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    pub fn with_characteristic(mut self, uuid: Uuid, properties: CharacteristicProperties) -> Self {
        self.characteristics.push(Characteristic {
            uuid,
            service_uuid: self.uuid,
            properties,
        });
        self
    }
}

/// Services of one device, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceTree {
    pub services: Vec<Service>,
}

impl ServiceTree {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn characteristic_count(&self) -> usize {
        self.services.iter().map(|s| s.characteristics.len()).sum()
    }
}

/// Read-only index over one discovered [`ServiceTree`].
///
/// Built once per discovery and replaced wholesale on the next one, so
/// holders of an older directory keep a consistent snapshot.
#[derive(Debug, Clone)]
pub struct GattCharacteristicDirectory {
    tree: Arc<ServiceTree>,
}

impl GattCharacteristicDirectory {
    pub fn new(tree: ServiceTree) -> Self {
        Self {
            tree: Arc::new(tree),
        }
    }

    pub fn tree(&self) -> &ServiceTree {
        &self.tree
    }

    /// Resolve a characteristic by UUID.
    ///
    /// Scans every service, then every characteristic, in discovery order.
    /// When the UUID appears under more than one service the last one seen
    /// wins.
    pub fn find(&self, uuid: &Uuid) -> Option<&Characteristic> {
        self.tree
            .services
            .iter()
            .flat_map(|service| service.characteristics.iter())
            .filter(|c| c.uuid == *uuid)
            .last()
    }
}
