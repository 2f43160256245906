//! BLE sensor gateway.
//!
//! Periodically scans for environmental sensors, reads them over GATT (or
//! straight from their broadcast frames) and publishes the readings as JSON
//! telemetry.

pub mod domain;
pub mod gateway;
pub mod infrastructure;
