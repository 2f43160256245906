//! BLE Connection Bookkeeping
//!
//! State of the one GATT link an acquisition session may hold: its handle,
//! the peer it points at, the characteristic directory built from the last
//! discovery and the reads still waiting for a completion.

use crate::domain::models::{ConnectionState, DeviceAddress, SensorDescriptor};
use crate::infrastructure::bluetooth::gatt::GattCharacteristicDirectory;
use crate::infrastructure::bluetooth::radio::LinkHandle;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct Connection {
    state: ConnectionState,
    link: Option<LinkHandle>,
    peer: Option<SensorDescriptor>,
    directory: Option<GattCharacteristicDirectory>,
    pending_reads: Vec<Uuid>,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn link(&self) -> Option<LinkHandle> {
        self.link
    }

    pub fn peer(&self) -> Option<&SensorDescriptor> {
        self.peer.as_ref()
    }

    pub fn directory(&self) -> Option<&GattCharacteristicDirectory> {
        self.directory.as_ref()
    }

    /// `true` if `link` is the link currently held.
    pub fn is_current(&self, link: LinkHandle) -> bool {
        self.link == Some(link)
    }

    /// The held link, if it points at `address`.
    pub fn link_for(&self, address: &DeviceAddress) -> Option<LinkHandle> {
        match (&self.peer, self.link) {
            (Some(peer), Some(link)) if peer.address == *address => Some(link),
            _ => None,
        }
    }

    /// Adopt a freshly opened link.
    pub fn attach(&mut self, link: LinkHandle, peer: SensorDescriptor) {
        self.link = Some(link);
        self.peer = Some(peer);
        self.directory = None;
        self.pending_reads.clear();
        self.state = ConnectionState::Connecting;
    }

    pub fn begin_reconnect(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn mark_linked(&mut self) {
        self.state = ConnectionState::Connected;
    }

    /// The link dropped. Discovered services and pending reads are void.
    pub fn mark_unlinked(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.directory = None;
        self.pending_reads.clear();
    }

    pub fn install_directory(&mut self, directory: GattCharacteristicDirectory) {
        self.directory = Some(directory);
    }

    pub fn expect_read(&mut self, uuid: Uuid) {
        self.pending_reads.push(uuid);
    }

    /// Consume the expectation for a read of `uuid`. `false` if none was pending.
    pub fn take_read(&mut self, uuid: &Uuid) -> bool {
        match self.pending_reads.iter().position(|pending| pending == uuid) {
            Some(index) => {
                self.pending_reads.remove(index);
                true
            }
            None => false,
        }
    }

    /// Forget everything, returning the link that still has to be torn down.
    pub fn release(&mut self) -> Option<LinkHandle> {
        self.mark_unlinked();
        self.peer = None;
        self.link.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::gatt::ServiceTree;

    fn peer() -> SensorDescriptor {
        SensorDescriptor::new("ST-2", DeviceAddress::new([0x24, 0x71, 0x89, 0x08, 0xBD, 0x82]))
    }

    #[test]
    fn test_lifecycle() {
        let mut connection = Connection::new();
        assert_eq!(connection.state(), ConnectionState::Disconnected);

        connection.attach(LinkHandle(3), peer());
        assert_eq!(connection.state(), ConnectionState::Connecting);
        assert_eq!(connection.link_for(&peer().address), Some(LinkHandle(3)));
        assert!(connection.is_current(LinkHandle(3)));
        assert!(!connection.is_current(LinkHandle(4)));

        connection.mark_linked();
        connection.install_directory(GattCharacteristicDirectory::new(ServiceTree::default()));
        connection.expect_read(Uuid::nil());
        assert_eq!(connection.state(), ConnectionState::Connected);
        assert!(connection.directory().is_some());

        connection.mark_unlinked();
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(connection.directory().is_none());
        assert!(!connection.take_read(&Uuid::nil()));
        // Link is kept for a later reconnect
        assert_eq!(connection.link(), Some(LinkHandle(3)));

        assert_eq!(connection.release(), Some(LinkHandle(3)));
        assert!(connection.peer().is_none());
        assert_eq!(connection.release(), None);
    }

    #[test]
    fn test_pending_reads_consumed_once() {
        let mut connection = Connection::new();
        connection.attach(LinkHandle(1), peer());
        connection.expect_read(Uuid::nil());
        assert!(connection.take_read(&Uuid::nil()));
        assert!(!connection.take_read(&Uuid::nil()));
    }

    #[test]
    fn test_link_for_other_address() {
        let mut connection = Connection::new();
        connection.attach(LinkHandle(1), peer());
        let other = DeviceAddress::new([0x24, 0x71, 0x89, 0xC1, 0x44, 0x02]);
        assert_eq!(connection.link_for(&other), None);
    }
}
