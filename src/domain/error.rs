//! Error types shared across the acquisition stack.

use crate::infrastructure::bluetooth::radio::RadioError;
use thiserror::Error;
use uuid::Uuid;

/// A payload could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed payload: expected {expected} bytes, got {actual}")]
    MalformedPayload { expected: usize, actual: usize },
}

/// Synchronous precondition failures. The requested operation was not attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("no bluetooth adapter available")]
    NoAdapter,

    #[error("invalid device address: {0:?}")]
    InvalidAddress(String),

    #[error("a scan is already in progress")]
    ScanInProgress,

    #[error("a connection is already active")]
    ConnectionActive,

    #[error("a connection attempt is already pending")]
    ConnectionPending,

    #[error("not connected")]
    NotConnected,

    #[error("services not discovered yet")]
    ServicesNotDiscovered,

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("radio rejected the command: {0}")]
    Radio(#[from] RadioError),
}
