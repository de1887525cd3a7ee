// evmqtt Device Layer
// Input device capability: open, grab, read, release

#[cfg(feature = "pure-rust")]
mod linux;
mod memory;

use std::io;
use std::time::Duration;

use crate::event::RawEvent;

#[cfg(feature = "pure-rust")]
pub use linux::{EvdevDevice, EvdevProvider};
pub use memory::{DeviceScript, MemoryProvider, ScriptedDevice};

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors from opening, grabbing or reading an input device
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl DeviceError {
    /// Classify an OS error for the device at `path`
    pub fn from_io(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => DeviceError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => DeviceError::PermissionDenied(path.to_string()),
            _ => DeviceError::Io {
                path: path.to_string(),
                source: err,
            },
        }
    }

    pub fn path(&self) -> &str {
        match self {
            DeviceError::NotFound(path) | DeviceError::PermissionDenied(path) => path,
            DeviceError::Io { path, .. } => path,
        }
    }
}

/// Path and human-readable name of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub path: String,
    pub name: String,
}

impl DeviceIdentity {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

/// A device found during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub path: String,
    pub name: String,
    /// Whether the device reports EV_KEY events
    pub has_keys: bool,
}

/// An opened input device.
///
/// Owned by exactly one monitor thread. `fetch_events` must return within
/// roughly `timeout` even when no input arrives, so the owner can observe its
/// stop flag.
pub trait InputDevice: Send {
    fn identity(&self) -> &DeviceIdentity;

    /// Acquire the device exclusively
    fn grab(&mut self) -> DeviceResult<()>;

    fn ungrab(&mut self) -> DeviceResult<()>;

    /// Wait up to `timeout` for input and return the pending events in
    /// device-report order. Returns an empty batch on timeout.
    fn fetch_events(&mut self, timeout: Duration) -> DeviceResult<Vec<RawEvent>>;
}

/// Opens and enumerates input devices
pub trait DeviceProvider: Send + Sync {
    fn open(&self, path: &str) -> DeviceResult<Box<dyn InputDevice>>;

    /// Every readable input device, sorted by path
    fn enumerate(&self) -> DeviceResult<Vec<DeviceDescriptor>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classification() {
        let err = DeviceError::from_io("/dev/input/event3", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, DeviceError::NotFound(ref p) if p == "/dev/input/event3"));

        let err = DeviceError::from_io("/dev/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, DeviceError::PermissionDenied(_)));

        let err = DeviceError::from_io("/dev/x", io::Error::other("boom"));
        assert!(matches!(err, DeviceError::Io { .. }));
        assert_eq!(err.path(), "/dev/x");
        assert_eq!(err.to_string(), "IO error on /dev/x: boom");
    }
}
