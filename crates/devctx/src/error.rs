//! Discovery error types
//!
//! Every error here is `Clone`: the outcome of the first `get_device()` call
//! on a [`DeviceInfo`](crate::DeviceInfo) is cached and handed to every later
//! caller.

use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the discovery core
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// No descriptor carries the requested interface index
    #[error("Interface {interface} not found")]
    NotFound { interface: u8 },

    /// The device is in firmware-recovery mode and cannot be opened
    #[error("{0}")]
    DeviceInRecoveryMode(String),

    /// A caller-supplied argument was rejected
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by the backend, propagated unchanged
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors reported by a backend implementation
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// libusb failure
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// Recording file could not be written or replayed
    #[error("Recording error: {0}")]
    Recording(Arc<descriptors::FormatError>),

    /// I/O failure outside the recording codec
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// A descriptor group refers to hardware that is no longer present
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The backend cannot perform the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(Arc::new(err))
    }
}

impl From<descriptors::FormatError> for BackendError {
    fn from(err: descriptors::FormatError) -> Self {
        BackendError::Recording(Arc::new(err))
    }
}

/// Type alias for discovery results
pub type Result<T> = std::result::Result<T, Error>;
