//! Acquisition Session
//!
//! The state machine that drives one sensor read:
//!
//! ```text
//! start_scan ──► advertisement matches ──► broadcast frame? ── yes ──► BroadcastDataAvailable
//!     │                    │                                           (or ScanFinished on bad checksum)
//!     │                    no
//!     │                    ▼
//!     │          connect ──► Connecting ──linked──► Connected ──► discover
//!     │                                                │
//!     ▼                                                ▼
//! timeout ──► ScanFinished          arm / read ──► DataAvailable ──► close
//! ```
//!
//! Commands return immediately; the radio's completions come back as
//! [`RadioEvent`]s and are applied one at a time through [`AcquisitionSession::handle`].

use crate::domain::checksum;
use crate::domain::codec;
use crate::domain::error::AcquisitionError;
use crate::domain::models::{
    ConnectionState, DeviceAddress, Measurement, Reading, SensorDescriptor, SessionEvent,
};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::connection::Connection;
use crate::infrastructure::bluetooth::gatt::{
    Characteristic, GattCharacteristicDirectory, ServiceTree,
};
use crate::infrastructure::bluetooth::protocol::{self, BROADCAST_COMPANY_ID, SENSOR_ENABLE};
use crate::infrastructure::bluetooth::radio::{
    Advertisement, GattStatus, LinkHandle, RadioEvent, RadioStack,
};
use crate::infrastructure::bluetooth::scanner::{BleScanner, SCAN_PERIOD};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Configuration for an acquisition session
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// How long a scan may run before it is abandoned
    pub scan_period: Duration,
    /// Company identifier that marks a broadcast sensor frame
    pub broadcast_company_id: u16,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            scan_period: SCAN_PERIOD,
            broadcast_company_id: BROADCAST_COMPANY_ID,
        }
    }
}

impl From<&Settings> for AcquisitionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            scan_period: settings.scan_period(),
            broadcast_company_id: settings.broadcast_company_id,
        }
    }
}

/// One logical device session: at most one scan or one link at a time.
pub struct AcquisitionSession<R: RadioStack> {
    radio: R,
    scanner: BleScanner,
    connection: Connection,
    event_sender: mpsc::UnboundedSender<SessionEvent>,
    config: AcquisitionConfig,
}

impl<R: RadioStack> AcquisitionSession<R> {
    /// Create a session.
    ///
    /// `inbox` is the sending half of the queue this session's owner drains
    /// into [`handle`](Self::handle); scan deadlines are posted there.
    pub fn new(
        radio: R,
        inbox: mpsc::UnboundedSender<RadioEvent>,
        event_sender: mpsc::UnboundedSender<SessionEvent>,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            radio,
            scanner: BleScanner::new(config.scan_period, inbox),
            connection: Connection::new(),
            event_sender,
            config,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    /// Address of the device being scanned for or connected to.
    pub fn remembered_address(&self) -> Option<DeviceAddress> {
        self.scanner
            .target()
            .or(self.connection.peer())
            .map(|sensor| sensor.address)
    }

    pub fn directory(&self) -> Option<&GattCharacteristicDirectory> {
        self.connection.directory()
    }

    pub fn service_tree(&self) -> Option<&ServiceTree> {
        self.connection.directory().map(|d| d.tree())
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Start a time-bounded scan for `target`.
    ///
    /// # Panics
    ///
    /// Arms the scan deadline with `tokio::spawn`, so it panics when called
    /// outside a tokio runtime.
    pub fn start_scan(&mut self, target: SensorDescriptor) -> Result<(), AcquisitionError> {
        if !self.radio.is_available() {
            warn!("Bluetooth adapter not available, cannot scan");
            return Err(AcquisitionError::NoAdapter);
        }
        if self.scanner.is_scanning() {
            return Err(AcquisitionError::ScanInProgress);
        }
        match self.connection.state() {
            ConnectionState::Connecting => return Err(AcquisitionError::ConnectionPending),
            ConnectionState::Connected => return Err(AcquisitionError::ConnectionActive),
            ConnectionState::Disconnected => {}
        }

        self.radio.start_scan()?;
        info!(
            "Scanning for {} ({}) for {:?}",
            target.name,
            target.address,
            self.scanner.period()
        );
        let scan_id = self.scanner.begin(target);
        debug!("Scan #{} started", scan_id);

        Ok(())
    }

    /// Stop the active scan, if any, and report it finished.
    pub fn stop_scan(&mut self) {
        if self.halt_scan().is_some() {
            info!("Scan stopped");
            self.emit(SessionEvent::ScanFinished);
        }
    }

    /// Open (or reuse) a link to `address`.
    ///
    /// `Ok` means the attempt was issued or the link is already up; the
    /// outcome of a new attempt arrives later as `GattConnected` or
    /// `GattDisconnected`.
    pub fn connect(&mut self, address: &str) -> Result<(), AcquisitionError> {
        let address = address.parse::<DeviceAddress>().inspect_err(|e| {
            warn!("Unable to connect: {}", e);
        })?;

        let peer = self
            .connection
            .peer()
            .filter(|peer| peer.address == address)
            .cloned()
            .unwrap_or_else(|| SensorDescriptor::anonymous(address));

        self.connect_to(peer)
    }

    fn connect_to(&mut self, peer: SensorDescriptor) -> Result<(), AcquisitionError> {
        if !self.radio.is_available() {
            warn!("Bluetooth adapter not available, cannot connect");
            return Err(AcquisitionError::NoAdapter);
        }
        if self.scanner.is_scanning() {
            return Err(AcquisitionError::ScanInProgress);
        }

        if let Some(link) = self.connection.link_for(&peer.address) {
            match self.connection.state() {
                ConnectionState::Connected | ConnectionState::Connecting => {
                    debug!("Already linked to {}", peer.address);
                    return Ok(());
                }
                ConnectionState::Disconnected => {
                    debug!("Trying to reuse existing link to {}", peer.address);
                    self.radio.reconnect(link)?;
                    self.connection.begin_reconnect();
                    return Ok(());
                }
            }
        }

        if self.connection.state() == ConnectionState::Connecting {
            return Err(AcquisitionError::ConnectionPending);
        }

        if let Some(stale) = self.connection.release() {
            info!("Dropping stale link {:?}", stale);
            self.radio.disconnect(stale);
            self.radio.close(stale);
        }

        let link = self.radio.connect(&peer.address).inspect_err(|e| {
            warn!("Unable to connect to {}: {}", peer.address, e);
        })?;
        info!("Connecting to {} ({}) on {:?}", peer.name, peer.address, link);
        self.connection.attach(link, peer);

        Ok(())
    }

    /// Switch on the sensor behind `uuid` by writing the enable value.
    pub fn arm_characteristic(&mut self, uuid: &Uuid) -> Result<(), AcquisitionError> {
        let (link, characteristic) = self.resolve(uuid).inspect_err(|e| {
            warn!("Cannot arm {}: {}", uuid, e);
        })?;

        self.radio
            .write_characteristic(link, &characteristic, SENSOR_ENABLE)?;
        debug!("Arming {}", uuid);

        Ok(())
    }

    /// Issue a read of `uuid`. The value arrives as `DataAvailable`.
    pub fn read_characteristic(&mut self, uuid: &Uuid) -> Result<(), AcquisitionError> {
        let (link, characteristic) = self.resolve(uuid).inspect_err(|e| {
            warn!("Cannot read {}: {}", uuid, e);
        })?;

        self.radio.read_characteristic(link, &characteristic)?;
        self.connection.expect_read(*uuid);
        debug!("Reading {}", uuid);

        Ok(())
    }

    /// Tear down the link, if any, and forget the remembered device.
    pub fn close(&mut self) {
        if let Some(link) = self.connection.release() {
            self.radio.disconnect(link);
            self.radio.close(link);
            info!("Connection {:?} closed", link);
        }
    }

    /// Apply one completion from the radio (or the scan deadline).
    pub fn handle(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::AdvertisementReceived(advertisement) => self.on_advertisement(advertisement),
            RadioEvent::ConnectionStateChanged { link, linked } => {
                self.on_connection_state_changed(link, linked)
            }
            RadioEvent::ServicesDiscovered { link, result } => {
                self.on_services_discovered(link, result)
            }
            RadioEvent::CharacteristicRead {
                link,
                uuid,
                status,
                value,
            } => self.on_characteristic_read(link, uuid, status, value),
            RadioEvent::CharacteristicWritten { link, uuid, status } => {
                self.on_characteristic_written(link, uuid, status)
            }
            RadioEvent::ScanTimeout { scan_id } => self.on_scan_timeout(scan_id),
        }
    }

    fn on_advertisement(&mut self, advertisement: Advertisement) {
        let Some(target) = self.scanner.target() else {
            trace!("Advertisement from {} outside a scan", advertisement.address);
            return;
        };

        trace!(
            "Device: {} ({})",
            advertisement.name.as_deref().unwrap_or("?"),
            advertisement.address
        );
        if !target.address.matches(&advertisement.address) {
            return;
        }

        let Some(target) = self.halt_scan() else {
            return;
        };
        info!("Device {} found", target.name);

        match advertisement.manufacturer_data(self.config.broadcast_company_id) {
            Some(frame) => {
                let frame = frame.to_vec();
                self.deliver_broadcast(target, frame);
            }
            None => {
                if let Err(e) = self.connect_to(target) {
                    warn!("Connect after scan match failed: {}", e);
                    self.emit(SessionEvent::ScanFinished);
                }
            }
        }
    }

    fn deliver_broadcast(&mut self, sensor: SensorDescriptor, frame: Vec<u8>) {
        debug!("Broadcast frame from {}: {:02X?}", sensor.address, frame);

        if !checksum::is_valid(&frame) {
            error!("Wrong checksum on broadcast frame from {}", sensor.name);
            self.emit(SessionEvent::ScanFinished);
            return;
        }

        let decoded = codec::decode_broadcast_temperature(&frame).and_then(|temperature| {
            codec::decode_broadcast_humidity(&frame).map(|humidity| (temperature, humidity))
        });
        match decoded {
            Ok((temperature, humidity)) => {
                let readings = vec![
                    Reading::new(sensor.clone(), Measurement::Temperature(temperature)),
                    Reading::new(sensor, Measurement::Humidity(humidity)),
                ];
                self.emit(SessionEvent::BroadcastDataAvailable {
                    payload: frame,
                    readings,
                });
            }
            Err(e) => {
                error!("Undecodable broadcast frame: {}", e);
                self.emit(SessionEvent::ScanFinished);
            }
        }
    }

    fn on_connection_state_changed(&mut self, link: LinkHandle, linked: bool) {
        if !self.connection.is_current(link) {
            debug!("Ignoring state change for stale link {:?}", link);
            return;
        }

        if linked {
            self.connection.mark_linked();
            info!("Connected to GATT server");
            self.emit(SessionEvent::GattConnected);

            match self.radio.discover_services(link) {
                Ok(()) => debug!("Service discovery started"),
                Err(e) => warn!("Could not start service discovery: {}", e),
            }
        } else {
            self.connection.mark_unlinked();
            info!("Disconnected from GATT server");
            self.emit(SessionEvent::GattDisconnected);
        }
    }

    fn on_services_discovered(&mut self, link: LinkHandle, result: Result<ServiceTree, GattStatus>) {
        if !self.connection.is_current(link)
            || self.connection.state() != ConnectionState::Connected
        {
            debug!("Ignoring discovery result for inactive link {:?}", link);
            return;
        }

        match result {
            Ok(tree) => {
                info!(
                    "Services discovered: {} services, {} characteristics",
                    tree.services.len(),
                    tree.characteristic_count()
                );
                self.connection
                    .install_directory(GattCharacteristicDirectory::new(tree));
                self.emit(SessionEvent::ServicesDiscovered);
            }
            Err(status) => warn!("Service discovery failed: {:?}", status),
        }
    }

    fn on_characteristic_read(
        &mut self,
        link: LinkHandle,
        uuid: Uuid,
        status: GattStatus,
        value: Vec<u8>,
    ) {
        if !self.connection.is_current(link) || !self.connection.take_read(&uuid) {
            debug!("Dropping read completion for {} on {:?}", uuid, link);
            return;
        }
        if !status.is_success() {
            warn!("Read of {} failed: {:?}", uuid, status);
            return;
        }
        let Some(sensor) = self.connection.peer().cloned() else {
            return;
        };

        debug!("Read {}: {:02X?}", uuid, value);
        match protocol::decoder_for(&uuid) {
            Some(decoder) => match decoder.decode(&value) {
                Ok(measurement) => {
                    self.emit(SessionEvent::DataAvailable(Reading::new(sensor, measurement)))
                }
                Err(e) => warn!("Dropping payload from {}: {}", uuid, e),
            },
            None => self.emit(SessionEvent::RawDataAvailable {
                uuid,
                payload: value,
            }),
        }
    }

    fn on_characteristic_written(&mut self, link: LinkHandle, uuid: Uuid, status: GattStatus) {
        if status.is_success() {
            debug!("Wrote {} on {:?}", uuid, link);
        } else {
            warn!("Write of {} failed: {:?}", uuid, status);
        }
    }

    fn on_scan_timeout(&mut self, scan_id: u64) {
        if !self.scanner.is_current(scan_id) {
            debug!("Ignoring deadline of finished scan #{}", scan_id);
            return;
        }

        if let Some(target) = self.halt_scan() {
            info!("Scan for {} timed out", target.name);
        }
        self.emit(SessionEvent::ScanFinished);
    }

    fn resolve(&self, uuid: &Uuid) -> Result<(LinkHandle, Characteristic), AcquisitionError> {
        let link = match (self.connection.state(), self.connection.link()) {
            (ConnectionState::Connected, Some(link)) => link,
            _ => return Err(AcquisitionError::NotConnected),
        };
        let directory = self
            .connection
            .directory()
            .ok_or(AcquisitionError::ServicesNotDiscovered)?;
        let characteristic = directory
            .find(uuid)
            .cloned()
            .ok_or(AcquisitionError::CharacteristicNotFound(*uuid))?;

        Ok((link, characteristic))
    }

    /// Stop the radio scan and disarm its deadline without reporting.
    fn halt_scan(&mut self) -> Option<SensorDescriptor> {
        let target = self.scanner.end()?;
        if let Err(e) = self.radio.stop_scan() {
            warn!("Failed to stop scan: {}", e);
        }
        Some(target)
    }

    fn emit(&self, event: SessionEvent) {
        trace!("Session event: {:?}", event);
        let _ = self.event_sender.send(event);
    }
}
