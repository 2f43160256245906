//! Bluetooth Module
//!
//! BLE acquisition of environmental sensor readings.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  AcquisitionSession                      │
//! │   (state machine - public API for the gateway)           │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┬─────────────┐
//!         │             │             │             │
//!         ▼             ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐  ┌──────────┐
//! │  Scanner  │  │ Connection │  │ Protocol │  │  Radio   │
//! │           │  │            │  │          │  │          │
//! │ - scan id │  │ - link     │  │ - UUIDs  │  │ - stack  │
//! │ - timeout │  │ - GATT dir │  │ - decoder│  │   trait  │
//! │   guard   │  │ - reads    │  │   table  │  │ - events │
//! └───────────┘  └────────────┘  └──────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`radio`] - Contract with the host radio stack and its completion events
//! - [`gatt`] - Service tree and characteristic directory
//! - [`protocol`] - Sensor UUIDs, constants and the decoder table
//! - [`scanner`] - Scan bookkeeping and the scan timeout guard
//! - [`connection`] - Bookkeeping for the single GATT link
//! - [`service`] - The acquisition state machine
//! - [`simulated`] - In-process radio stack for bench runs and tests

pub mod connection;
pub mod gatt;
pub mod protocol;
pub mod radio;
pub mod scanner;
pub mod service;
pub mod simulated;

// Re-export main service for convenience
pub use service::{AcquisitionConfig, AcquisitionSession};
