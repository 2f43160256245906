//! Gateway scheduler.
//!
//! Owns the acquisition session and drives one read cycle per period:
//! scan for the next sensor in the roster, arm and read it once its
//! services are known, publish the reading and close the link.

use crate::domain::models::{ConnectionState, Reading, SensorDescriptor, SessionEvent};
use crate::domain::settings::Settings;
use crate::domain::telemetry::{TelemetryPayload, TelemetryPublisher};
use crate::infrastructure::bluetooth::protocol::SensorFamily;
use crate::infrastructure::bluetooth::radio::{RadioEvent, RadioStack};
use crate::infrastructure::bluetooth::{AcquisitionConfig, AcquisitionSession};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Configured sensors, visited round-robin.
#[derive(Debug, Clone)]
pub struct SensorRoster {
    sensors: Vec<SensorDescriptor>,
    current: usize,
}

impl SensorRoster {
    pub fn new(sensors: Vec<SensorDescriptor>) -> anyhow::Result<Self> {
        if sensors.is_empty() {
            anyhow::bail!("No sensors configured");
        }
        Ok(Self {
            sensors,
            current: 0,
        })
    }

    /// Advance to the next sensor, wrapping to the first after the last.
    pub fn next_sensor(&mut self) -> &SensorDescriptor {
        self.current = if self.current >= self.sensors.len() - 1 {
            0
        } else {
            self.current + 1
        };
        &self.sensors[self.current]
    }

    pub fn current_sensor(&self) -> &SensorDescriptor {
        &self.sensors[self.current]
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

pub struct Gateway<R: RadioStack> {
    session: AcquisitionSession<R>,
    radio_events: mpsc::UnboundedReceiver<RadioEvent>,
    session_events: mpsc::UnboundedReceiver<SessionEvent>,
    roster: SensorRoster,
    family: &'static SensorFamily,
    publishers: Vec<Arc<dyn TelemetryPublisher>>,
    read_period: Duration,
    settle_delay: Duration,
    busy: bool,
    read_due: Option<Instant>,
}

impl<R: RadioStack> Gateway<R> {
    /// Wire a gateway together.
    ///
    /// `radio_factory` receives the sender the radio stack must post its
    /// completions to.
    pub fn build<F>(
        settings: &Settings,
        publishers: Vec<Arc<dyn TelemetryPublisher>>,
        radio_factory: F,
    ) -> anyhow::Result<Self>
    where
        F: FnOnce(mpsc::UnboundedSender<RadioEvent>) -> R,
    {
        let roster = SensorRoster::new(settings.sensors.clone())?;
        let (radio_tx, radio_events) = mpsc::unbounded_channel();
        let (session_tx, session_events) = mpsc::unbounded_channel();

        let radio = radio_factory(radio_tx.clone());
        let session = AcquisitionSession::new(
            radio,
            radio_tx,
            session_tx,
            AcquisitionConfig::from(settings),
        );
        let family = settings.sensor_family.family();

        info!(
            "Gateway ready: {} sensor(s), {} family, read every {:?}",
            roster.len(),
            family.name,
            settings.read_period()
        );

        Ok(Self {
            session,
            radio_events,
            session_events,
            roster,
            family,
            publishers,
            read_period: settings.read_period(),
            settle_delay: settings.settle_delay(),
            busy: false,
            read_due: None,
        })
    }

    pub fn session(&self) -> &AcquisitionSession<R> {
        &self.session
    }

    pub fn roster(&self) -> &SensorRoster {
        &self.roster
    }

    /// Run read cycles until `shutdown` resolves, then release the radio.
    pub async fn run<S>(&mut self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        // First cycle starts right away instead of one period after start
        let mut ticker = tokio::time::interval(self.read_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let read_due = self.read_due;
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => self.on_tick(),
                Some(event) = self.radio_events.recv() => self.session.handle(event),
                Some(event) = self.session_events.recv() => self.on_session_event(event),
                _ = tokio::time::sleep_until(read_due.unwrap_or_else(Instant::now)), if read_due.is_some() => {
                    self.read_due = None;
                    self.read_data();
                }
            }
        }

        self.session.stop_scan();
        self.session.close();
    }

    fn on_tick(&mut self) {
        if self.session.is_scanning() {
            debug!("Previous scan still running, skipping");
            return;
        }
        if self.busy || self.session.connection_state() != ConnectionState::Disconnected {
            warn!(
                "Abandoning unfinished cycle for {}",
                self.roster.current_sensor().name
            );
            self.abandon_cycle();
        }

        let sensor = self.roster.next_sensor().clone();
        match self.session.start_scan(sensor.clone()) {
            Ok(()) => self.busy = true,
            Err(e) => warn!("Cannot scan for {}: {}", sensor.name, e),
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        let sensor = self.roster.current_sensor().name.clone();

        match event {
            SessionEvent::ScanFinished => info!("Scan for {} finished", sensor),
            SessionEvent::GattConnected => info!("Connected {}", sensor),
            SessionEvent::GattDisconnected => info!("Disconnected {}", sensor),
            SessionEvent::ServicesDiscovered => {
                match self.session.arm_characteristic(&self.family.config) {
                    // Give the sensor time to produce a first sample
                    Ok(()) => self.read_due = Some(Instant::now() + self.settle_delay),
                    Err(e) => {
                        warn!("Could not arm {}: {}", sensor, e);
                        self.session.close();
                    }
                }
            }
            SessionEvent::DataAvailable(reading) => {
                self.publish(&reading);
                self.session.close();
            }
            SessionEvent::BroadcastDataAvailable { readings, .. } => {
                for reading in &readings {
                    self.publish(reading);
                }
            }
            SessionEvent::RawDataAvailable { uuid, payload } => {
                info!("Read {} from {}: {:02X?}", uuid, sensor, payload);
                self.session.close();
            }
        }

        self.busy = false;
    }

    fn read_data(&mut self) {
        info!("Reading {}", self.roster.current_sensor().name);
        if let Err(e) = self.session.read_characteristic(&self.family.data) {
            warn!("Read skipped: {}", e);
            self.session.close();
        }
    }

    /// Drop whatever the last cycle left behind: a pending read and the link.
    fn abandon_cycle(&mut self) {
        self.read_due = None;
        self.busy = false;
        self.session.close();
    }

    fn publish(&self, reading: &Reading) {
        info!(
            "{} {}: {} {}",
            reading.sensor.name,
            reading.kind().label(),
            reading.value(),
            reading.kind().unit()
        );

        let payload = match TelemetryPayload::from_reading(reading).to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize reading: {}", e);
                return;
            }
        };

        for publisher in &self.publishers {
            let publisher = Arc::clone(publisher);
            let payload = payload.clone();
            tokio::spawn(async move {
                if let Err(e) = publisher.publish(payload).await {
                    warn!("Publisher {} failed: {}", publisher.name(), e);
                }
            });
        }
    }
}
