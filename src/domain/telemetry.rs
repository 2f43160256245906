//! Telemetry payloads and the publisher contract.
//!
//! Cloud publishers live outside this crate; the gateway only needs
//! something that accepts a JSON string and eventually reports success or
//! failure.

use crate::domain::models::Reading;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Timestamp layout used in published payloads (`yyyy-MM-dd HH:mm:ss.SSS`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("publisher {0} is not connected")]
    NotConnected(String),
}

/// Wire shape of a single reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryPayload {
    pub sensor_name: String,
    pub sensor_type: String,
    pub timestamp: String,
    pub value: String,
}

impl TelemetryPayload {
    pub fn from_reading(reading: &Reading) -> Self {
        Self {
            sensor_name: reading.sensor.name.clone(),
            sensor_type: reading.kind().label().to_string(),
            timestamp: reading.captured_at.format(TIMESTAMP_FORMAT).to_string(),
            // Debug keeps a trailing ".0" on whole numbers
            value: format!("{:?}", reading.value()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[async_trait]
pub trait TelemetryPublisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, payload: String) -> Result<(), PublishError>;
}

/// Publisher that only writes payloads to the log.
#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait]
impl TelemetryPublisher for LogPublisher {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(&self, payload: String) -> Result<(), PublishError> {
        info!(target: "telemetry", "{}", payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DeviceAddress, Measurement, SensorDescriptor};
    use chrono::{Local, TimeZone};

    fn reading(measurement: Measurement) -> Reading {
        Reading {
            sensor: SensorDescriptor::new(
                "ST-2",
                DeviceAddress::new([0x24, 0x71, 0x89, 0x08, 0xBD, 0x82]),
            ),
            measurement,
            captured_at: Local
                .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
                .single()
                .unwrap(),
        }
    }

    #[test]
    fn test_payload_fields() {
        let payload = TelemetryPayload::from_reading(&reading(Measurement::Temperature(21.5)));
        assert_eq!(payload.sensor_name, "ST-2");
        assert_eq!(payload.sensor_type, "temperature");
        assert_eq!(payload.timestamp, "2024-03-09 14:05:07.000");
        assert_eq!(payload.value, "21.5");
    }

    #[test]
    fn test_payload_json_shape() {
        let payload = TelemetryPayload::from_reading(&reading(Measurement::Illuminance(49.0)));
        assert_eq!(
            payload.to_json().unwrap(),
            "{\"sensor_name\":\"ST-2\",\"sensor_type\":\"illuminance\",\
             \"timestamp\":\"2024-03-09 14:05:07.000\",\"value\":\"49.0\"}"
        );
    }

    #[tokio::test]
    async fn test_log_publisher_accepts_everything() {
        let publisher = LogPublisher;
        assert_eq!(publisher.name(), "log");
        assert!(publisher.publish("{}".to_string()).await.is_ok());
    }
}
