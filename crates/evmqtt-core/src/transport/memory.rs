// evmqtt In-Memory Transport
// Records publishes and dispatches injected messages without a broker

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{MessageHandler, QoS, SubscriptionRegistry, Transport, TransportError, TransportResult};

/// A message handed to [`MemoryTransport::publish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl PublishedMessage {
    /// Payload as UTF-8 text (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Payload parsed as JSON
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.payload).ok()
    }
}

/// Transport that keeps everything in memory.
///
/// Publishes are recorded in order while connected and rejected with
/// [`TransportError::NotConnected`] otherwise. [`MemoryTransport::deliver`]
/// plays the role of the broker pushing a message to subscribers.
#[derive(Default)]
pub struct MemoryTransport {
    published: Mutex<Vec<PublishedMessage>>,
    registry: SubscriptionRegistry,
    connected: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that is already connected
    pub fn connected() -> Self {
        let transport = Self::new();
        transport.connected.store(true, Ordering::SeqCst);
        transport
    }

    /// Inject an inbound message, returning the number of handlers run
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> usize {
        self.registry.dispatch(topic, payload)
    }

    /// Every message published so far, oldest first
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    /// Messages published to `topic`, oldest first
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.registry.patterns()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn connect(&self) -> TransportResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.published.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }

    fn subscribe(&self, pattern: &str, handler: MessageHandler) -> TransportResult<()> {
        self.registry.add(pattern, handler);
        Ok(())
    }

    fn disconnect(&self) -> TransportResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
