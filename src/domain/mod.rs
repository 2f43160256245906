//! Domain types and pure logic: addresses, readings, payload codecs,
//! settings and the telemetry contract.

pub mod checksum;
pub mod codec;
pub mod error;
pub mod models;
pub mod settings;
pub mod telemetry;
