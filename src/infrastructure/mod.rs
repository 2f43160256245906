//! Adapters around the outside world: the BLE radio and the log sinks.

pub mod bluetooth;
pub mod logging;
