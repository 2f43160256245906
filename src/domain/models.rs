use crate::domain::error::AcquisitionError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 6-byte BLE hardware address.
///
/// Parsing is case-insensitive, so two addresses compare equal regardless of
/// how the radio stack or the settings file spelled them. Rendered as
/// upper-case colon-separated hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Case-insensitive match against an address string as reported by the
    /// radio stack. Unparseable strings never match.
    pub fn matches(&self, reported: &str) -> bool {
        reported
            .parse::<DeviceAddress>()
            .map(|other| other == *self)
            .unwrap_or(false)
    }
}

impl FromStr for DeviceAddress {
    type Err = AcquisitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AcquisitionError::InvalidAddress(s.to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        let mut parts = trimmed.split([':', '-']);
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = AcquisitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceAddress> for String {
    fn from(address: DeviceAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

/// A configured sensor: friendly name plus hardware address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDescriptor {
    pub name: String,
    pub address: DeviceAddress,
}

impl SensorDescriptor {
    pub fn new(name: impl Into<String>, address: DeviceAddress) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }

    /// Descriptor for a device that was connected by address only.
    pub fn anonymous(address: DeviceAddress) -> Self {
        Self {
            name: address.to_string(),
            address,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Temperature,
    Humidity,
    Illuminance,
}

impl MeasurementKind {
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%RH",
            Self::Illuminance => "lux",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Illuminance => "illuminance",
        }
    }
}

/// One decoded physical value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// Degrees Celsius
    Temperature(f64),
    /// Relative humidity in percent
    Humidity(f64),
    Illuminance(f64),
}

impl Measurement {
    pub fn kind(&self) -> MeasurementKind {
        match self {
            Self::Temperature(_) => MeasurementKind::Temperature,
            Self::Humidity(_) => MeasurementKind::Humidity,
            Self::Illuminance(_) => MeasurementKind::Illuminance,
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            Self::Temperature(v) | Self::Humidity(v) | Self::Illuminance(v) => v,
        }
    }
}

/// A decoded measurement tagged with the sensor that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor: SensorDescriptor,
    pub measurement: Measurement,
    pub captured_at: DateTime<Local>,
}

impl Reading {
    pub fn new(sensor: SensorDescriptor, measurement: Measurement) -> Self {
        Self {
            sensor,
            measurement,
            captured_at: Local::now(),
        }
    }

    pub fn kind(&self) -> MeasurementKind {
        self.measurement.kind()
    }

    pub fn value(&self) -> f64 {
        self.measurement.value()
    }
}

/// Events surfaced by an acquisition session to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    GattConnected,
    GattDisconnected,
    ScanFinished,
    ServicesDiscovered,
    /// A characteristic read decoded into a physical value.
    DataAvailable(Reading),
    /// A broadcast frame passed its checksum and was decoded without connecting.
    BroadcastDataAvailable {
        payload: Vec<u8>,
        readings: Vec<Reading>,
    },
    /// A characteristic read for a UUID with no registered decoder.
    RawDataAvailable { uuid: Uuid, payload: Vec<u8> },
}
