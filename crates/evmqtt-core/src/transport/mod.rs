// evmqtt Transport Layer
// Publish/subscribe abstraction over the MQTT client

mod memory;
#[cfg(feature = "pure-rust")]
mod mqtt;
mod registry;

use std::fmt;
use std::sync::Arc;

pub use memory::{MemoryTransport, PublishedMessage};
#[cfg(feature = "pure-rust")]
pub use mqtt::{generate_client_id, MqttSettings, MqttTransport};
pub use registry::{topic_matches, SubscriptionRegistry};

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by a transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected to broker")]
    NotConnected,

    #[error("Timed out waiting for broker connection")]
    Timeout,

    #[error("Invalid QoS level: {0}")]
    InvalidQos(u8),

    #[error("MQTT client error: {0}")]
    Client(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// MQTT delivery guarantee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QoS {
    pub fn from_u8(level: u8) -> TransportResult<Self> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(TransportError::InvalidQos(other)),
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Callback invoked with `(topic, payload)` for each delivered message.
///
/// Runs on the transport's delivery thread and must return quickly.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// A publish/subscribe transport.
///
/// `publish` is fire-and-forget: an `Ok` means the message was handed to the
/// transport, not that the broker received it. Handlers registered with
/// `subscribe` are invoked from the transport's own delivery context.
pub trait Transport: Send + Sync {
    fn connect(&self) -> TransportResult<()>;

    fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> TransportResult<()>;

    /// Register `handler` for every message whose topic matches `pattern`
    /// (`+` and `#` wildcards)
    fn subscribe(&self, pattern: &str, handler: MessageHandler) -> TransportResult<()>;

    fn disconnect(&self) -> TransportResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_from_u8() {
        assert_eq!(QoS::from_u8(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(QoS::from_u8(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(QoS::from_u8(2).unwrap(), QoS::ExactlyOnce);
        assert!(matches!(QoS::from_u8(3), Err(TransportError::InvalidQos(3))));
    }

    #[test]
    fn test_qos_display() {
        assert_eq!(QoS::default().to_string(), "0");
        assert_eq!(QoS::ExactlyOnce.to_string(), "2");
    }
}
