// evmqtt MQTT Transport
// rumqttc client with a background network thread

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};
use rumqttc::{Client, ConnectReturnCode, Connection, Event, MqttOptions, Outgoing, Packet};

use super::{MessageHandler, QoS, SubscriptionRegistry, Transport, TransportError, TransportResult};

/// Requests buffered between the client handle and the network thread
const REQUEST_CAPACITY: usize = 100;

/// Pause before the network thread retries after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Broker connection parameters
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive: Duration,
}

impl MqttSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            client_id: generate_client_id(),
            keep_alive: Duration::from_secs(60),
        }
    }

    /// Set credentials. An empty username means anonymous access.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        if username.is_empty() {
            self.username = None;
            self.password = None;
        } else {
            self.username = Some(username.to_string());
            self.password = Some(password.to_string());
        }
        self
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = &self.username {
            options.set_credentials(username.clone(), self.password.clone().unwrap_or_default());
        }
        options
    }
}

/// Client identifier of the form `evmqtt_<hostname>_<unix seconds>`
pub fn generate_client_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("evmqtt_{}_{}", hostname(), secs)
}

fn hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for writes of buf.len() bytes
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// State shared with the network thread
struct Shared {
    registry: SubscriptionRegistry,
    connected: Mutex<bool>,
    connected_changed: Condvar,
    shutdown: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            connected: Mutex::new(false),
            connected_changed: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    fn set_connected(&self, value: bool) {
        let mut connected = self.connected.lock();
        *connected = value;
        self.connected_changed.notify_all();
    }

    /// Mark the session connected, then re-issue every registered pattern.
    ///
    /// The flag is raised first: a `subscribe` racing this call either
    /// registers before the pattern snapshot or sees the flag and sends its
    /// own request.
    fn on_connected<E, F>(&self, mut subscribe: F)
    where
        E: std::fmt::Display,
        F: FnMut(&str) -> Result<(), E>,
    {
        self.set_connected(true);
        for pattern in self.registry.patterns() {
            if let Err(e) = subscribe(&pattern) {
                log::error!("Failed to subscribe to '{}': {}", pattern, e);
            }
        }
    }
}

/// MQTT 3.1.1 transport.
///
/// `connect` starts a network thread that drives the connection, reconnects
/// after errors and resubscribes every registered pattern on each
/// acknowledged connection. Inbound messages are dispatched on that thread.
pub struct MqttTransport {
    settings: MqttSettings,
    client: Client,
    connection: Mutex<Option<Connection>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl MqttTransport {
    pub fn new(settings: MqttSettings) -> Self {
        let (client, connection) = Client::new(settings.options(), REQUEST_CAPACITY);
        Self {
            settings,
            client,
            connection: Mutex::new(Some(connection)),
            worker: Mutex::new(None),
            shared: Arc::new(Shared::new()),
        }
    }

    pub fn settings(&self) -> &MqttSettings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        *self.shared.connected.lock()
    }

    /// Block until the broker acknowledges the connection or `timeout`
    /// elapses
    pub fn wait_for_connection(&self, timeout: Duration) -> TransportResult<()> {
        let deadline = Instant::now() + timeout;
        let mut connected = self.shared.connected.lock();
        while !*connected {
            if self
                .shared
                .connected_changed
                .wait_until(&mut connected, deadline)
                .timed_out()
            {
                return if *connected {
                    Ok(())
                } else {
                    Err(TransportError::Timeout)
                };
            }
        }
        Ok(())
    }
}

impl Transport for MqttTransport {
    fn connect(&self) -> TransportResult<()> {
        let Some(connection) = self.connection.lock().take() else {
            log::debug!("MQTT network thread already started");
            return Ok(());
        };

        log::info!(
            "Connecting to MQTT broker {}:{} as '{}'",
            self.settings.host,
            self.settings.port,
            self.settings.client_id
        );

        let client = self.client.clone();
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("evmqtt-mqtt".to_string())
            .spawn(move || network_loop(connection, client, shared))?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> TransportResult<()> {
        if self.shared.shutdown.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.client
            .try_publish(topic, to_mqtt_qos(qos), retain, payload.to_vec())
            .map_err(|e| TransportError::Client(e.to_string()))
    }

    fn subscribe(&self, pattern: &str, handler: MessageHandler) -> TransportResult<()> {
        self.shared.registry.add(pattern, handler);
        // Otherwise the pattern is sent when the next ConnAck arrives
        if self.is_connected() {
            self.client
                .try_subscribe(pattern, rumqttc::QoS::AtMostOnce)
                .map_err(|e| TransportError::Client(e.to_string()))?;
        }
        Ok(())
    }

    fn disconnect(&self) -> TransportResult<()> {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        log::info!("Disconnecting from MQTT broker");

        let result = self
            .client
            .try_disconnect()
            .map_err(|e| TransportError::Client(e.to_string()));
        self.shared.set_connected(false);

        // Without a queued Disconnect the network thread only exits on its
        // next connection error, so it is left detached
        if result.is_ok() {
            if let Some(handle) = self.worker.lock().take() {
                if handle.join().is_err() {
                    log::error!("MQTT network thread panicked");
                }
            }
        }
        result
    }
}

fn network_loop(mut connection: Connection, client: Client, shared: Arc<Shared>) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    log::info!("Connected to MQTT broker");
                    shared.on_connected(|pattern| {
                        client.try_subscribe(pattern, rumqttc::QoS::AtMostOnce)
                    });
                } else {
                    log::error!("MQTT broker refused connection: {:?}", ack.code);
                    shared.set_connected(false);
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                shared.registry.dispatch(&publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                log::warn!("MQTT broker closed the session");
                shared.set_connected(false);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                if shared.shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                shared.set_connected(false);
                if shared.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                log::warn!("MQTT connection error: {}; retrying", e);
                thread::sleep(RECONNECT_DELAY);
            }
        }
    }
    log::debug!("MQTT network thread finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_format() {
        let id = generate_client_id();
        assert!(id.starts_with("evmqtt_"));
        let secs = id.rsplit('_').next().unwrap();
        assert!(secs.parse::<u64>().is_ok());
    }

    #[test]
    fn test_settings_credentials() {
        let settings = MqttSettings::new("broker", 1883).with_credentials("user", "pw");
        assert_eq!(settings.username.as_deref(), Some("user"));
        assert_eq!(settings.password.as_deref(), Some("pw"));
        assert_eq!(settings.keep_alive, Duration::from_secs(60));

        let anonymous = settings.with_credentials("", "ignored");
        assert!(anonymous.username.is_none());
        assert!(anonymous.password.is_none());
    }

    fn noop() -> MessageHandler {
        Arc::new(|_: &str, _: &[u8]| {})
    }

    #[test]
    fn test_connack_raises_flag_before_resubscribing() {
        let shared = Shared::new();
        shared.registry.add("evmqtt/a/switch/set", noop());
        shared.registry.add("evmqtt/b/switch/set", noop());
        shared.registry.add("evmqtt/a/switch/set", noop());

        let mut sent = Vec::new();
        shared.on_connected(|pattern| {
            assert!(*shared.connected.lock(), "flag must be set before '{}'", pattern);
            sent.push(pattern.to_string());
            Ok::<(), String>(())
        });

        assert_eq!(sent, vec!["evmqtt/a/switch/set", "evmqtt/b/switch/set"]);
        assert!(*shared.connected.lock());
    }

    #[test]
    fn test_connack_continues_past_subscribe_errors() {
        let shared = Shared::new();
        shared.registry.add("evmqtt/a/switch/set", noop());
        shared.registry.add("evmqtt/b/switch/set", noop());

        let mut attempts = 0;
        shared.on_connected(|_| {
            attempts += 1;
            Err("request queue full")
        });
        assert_eq!(attempts, 2);
    }

    #[test]
    fn test_not_connected_before_connect() {
        let transport = MqttTransport::new(MqttSettings::new("127.0.0.1", 1883));
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.wait_for_connection(Duration::from_millis(10)),
            Err(TransportError::Timeout)
        ));
    }
}
