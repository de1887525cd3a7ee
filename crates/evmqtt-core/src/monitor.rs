// evmqtt Device Monitor
// Per-device worker: reads key events, gates them, publishes to MQTT

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::device::{DeviceError, DeviceIdentity, InputDevice};
use crate::discovery::{manual_unique_id, sanitize_path};
use crate::event::{KeyEvent, RawEvent};
use crate::policy::KeyEventPolicy;
use crate::transport::{QoS, Transport};

/// How long a device read may block before the stop flag is rechecked
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const SWITCH_ON: &str = "ON";
pub const SWITCH_OFF: &str = "OFF";

/// Called with `(device path, enabled)` after every switch change
pub type EnabledCallback = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Errors from starting a monitor
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Failed to grab device: {0}")]
    Grab(#[source] DeviceError),

    #[error("Monitor for {path} cannot start while {state:?}")]
    InvalidState { path: String, state: MonitorState },

    #[error("Failed to spawn monitor thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Lifecycle of a monitor. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Device opened, nothing published yet
    Created,
    Running,
    /// Stop requested, worker still draining
    Stopping,
    /// Device released
    Stopped,
}

/// JSON body published for each key press
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub key: String,
    pub device_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

/// Topics used by one monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorTopics {
    pub state: String,
    pub config: String,
    pub switch_state: String,
    pub switch_command: String,
    pub switch_config: String,
}

impl MonitorTopics {
    pub fn new(base_topic: &str, segment: &str, unique_id: &str) -> Self {
        let prefix = format!("{}/{}", base_topic.trim_end_matches('/'), segment);
        Self {
            state: format!("{}/state", prefix),
            config: format!("{}/config", prefix),
            switch_state: format!("{}/switch/state", prefix),
            switch_command: format!("{}/switch/set", prefix),
            switch_config: format!("homeassistant/switch/{}/config", unique_id),
        }
    }
}

/// Naming and initial state for a monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub base_topic: String,
    pub gateway_name: String,
    /// Set for discovered devices; manual devices use their sanitized path
    pub slug: Option<String>,
    pub unique_id: Option<String>,
    pub initially_enabled: bool,
}

impl MonitorConfig {
    pub fn new(base_topic: impl Into<String>, gateway_name: impl Into<String>) -> Self {
        Self {
            base_topic: base_topic.into(),
            gateway_name: gateway_name.into(),
            slug: None,
            unique_id: None,
            initially_enabled: true,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>, unique_id: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.initially_enabled = enabled;
        self
    }
}

/// Owns one input device and publishes its key presses.
///
/// The worker thread is the only reader of the device. Switch commands
/// arrive on the transport's delivery thread and only touch the `enabled`
/// flag, which the worker rereads for every event.
pub struct DeviceMonitor {
    identity: DeviceIdentity,
    slug: Option<String>,
    unique_id: String,
    gateway_name: String,
    topics: MonitorTopics,
    transport: Arc<dyn Transport>,
    policy: KeyEventPolicy,
    enabled: Mutex<bool>,
    stop_requested: AtomicBool,
    state: Mutex<MonitorState>,
    device: Mutex<Option<Box<dyn InputDevice>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    on_enabled_change: Option<EnabledCallback>,
}

impl DeviceMonitor {
    pub fn new(
        device: Box<dyn InputDevice>,
        config: MonitorConfig,
        transport: Arc<dyn Transport>,
        policy: KeyEventPolicy,
    ) -> Self {
        let identity = device.identity().clone();
        let segment = match &config.slug {
            Some(slug) => slug.clone(),
            None => sanitize_path(&identity.path),
        };
        let unique_id = config
            .unique_id
            .unwrap_or_else(|| manual_unique_id(&identity.path));
        let topics = MonitorTopics::new(&config.base_topic, &segment, &unique_id);

        Self {
            identity,
            slug: config.slug,
            unique_id,
            gateway_name: config.gateway_name,
            topics,
            transport,
            policy,
            enabled: Mutex::new(config.initially_enabled),
            stop_requested: AtomicBool::new(false),
            state: Mutex::new(MonitorState::Created),
            device: Mutex::new(Some(device)),
            worker: Mutex::new(None),
            on_enabled_change: None,
        }
    }

    pub fn with_enabled_callback(mut self, callback: EnabledCallback) -> Self {
        self.on_enabled_change = Some(callback);
        self
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn path(&self) -> &str {
        &self.identity.path
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn topics(&self) -> &MonitorTopics {
        &self.topics
    }

    pub fn state(&self) -> MonitorState {
        *self.state.lock()
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.lock()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn display_name(&self) -> String {
        format!("{} - {}", self.gateway_name, self.identity.name)
    }

    fn device_info(&self) -> serde_json::Value {
        json!({
            "identifiers": [self.unique_id],
            "name": self.display_name(),
            "model": self.identity.name,
            "manufacturer": "evmqtt",
        })
    }

    /// Home Assistant sensor discovery payload
    pub fn sensor_config(&self) -> serde_json::Value {
        json!({
            "name": self.display_name(),
            "state_topic": self.topics.state,
            "unique_id": self.unique_id,
            "value_template": "{{ value_json.key }}",
            "json_attributes_topic": self.topics.state,
            "icon": "mdi:keyboard",
            "device": self.device_info(),
        })
    }

    /// Home Assistant switch discovery payload
    pub fn switch_config(&self) -> serde_json::Value {
        json!({
            "name": format!("{} Enable", self.display_name()),
            "state_topic": self.topics.switch_state,
            "command_topic": self.topics.switch_command,
            "payload_on": SWITCH_ON,
            "payload_off": SWITCH_OFF,
            "state_on": SWITCH_ON,
            "state_off": SWITCH_OFF,
            "unique_id": format!("{}_enable", self.unique_id),
            "icon": "mdi:keyboard-settings",
            "device": self.device_info(),
        })
    }

    fn publish_retained(&self, topic: &str, payload: &[u8]) {
        if let Err(e) = self.transport.publish(topic, payload, QoS::AtMostOnce, true) {
            log::warn!("Failed to publish to '{}': {}", topic, e);
        }
    }

    fn publish_autodiscovery(&self) {
        self.publish_retained(&self.topics.config, self.sensor_config().to_string().as_bytes());
        log::info!("Published sensor autodiscovery to '{}'", self.topics.config);

        self.publish_retained(
            &self.topics.switch_config,
            self.switch_config().to_string().as_bytes(),
        );
        log::info!(
            "Published switch autodiscovery to '{}'",
            self.topics.switch_config
        );
    }

    fn publish_switch_state(&self, enabled: bool) {
        let payload = if enabled { SWITCH_ON } else { SWITCH_OFF };
        self.publish_retained(&self.topics.switch_state, payload.as_bytes());
    }

    /// Remove both entities from Home Assistant by clearing their retained
    /// discovery configs
    pub fn cleanup_autodiscovery(&self) {
        self.publish_retained(&self.topics.config, b"");
        self.publish_retained(&self.topics.switch_config, b"");
        log::info!("Removed autodiscovery for '{}'", self.identity.path);
    }

    /// Grab the device, publish discovery metadata and the current switch
    /// state, then spawn the worker thread.
    ///
    /// A grab failure stops only this monitor.
    pub fn start(self: &Arc<Self>) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        if *state != MonitorState::Created {
            return Err(MonitorError::InvalidState {
                path: self.identity.path.clone(),
                state: *state,
            });
        }
        let Some(mut device) = self.device.lock().take() else {
            *state = MonitorState::Stopped;
            return Err(MonitorError::InvalidState {
                path: self.identity.path.clone(),
                state: MonitorState::Stopped,
            });
        };

        if let Err(e) = device.grab() {
            log::error!("Failed to grab device '{}': {}", self.identity.path, e);
            *state = MonitorState::Stopped;
            return Err(MonitorError::Grab(e));
        }
        log::info!("Grabbed device '{}'", self.identity.path);

        self.publish_autodiscovery();
        {
            let enabled = self.enabled.lock();
            self.publish_switch_state(*enabled);
        }
        *state = MonitorState::Running;
        drop(state);

        let segment = match &self.slug {
            Some(slug) => slug.clone(),
            None => sanitize_path(&self.identity.path),
        };
        let monitor = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("evmqtt-{}", segment))
            .spawn(move || monitor.run(device));

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                // The closure, and with it the device, is dropped here
                *self.state.lock() = MonitorState::Stopped;
                Err(MonitorError::Spawn(e))
            }
        }
    }

    fn run(&self, mut device: Box<dyn InputDevice>) {
        log::info!(
            "Monitoring '{}' ({}) -> topic '{}'",
            self.identity.name,
            self.identity.path,
            self.topics.state
        );

        'read: while !self.is_stop_requested() {
            match device.fetch_events(POLL_INTERVAL) {
                Ok(events) => {
                    for event in &events {
                        if self.is_stop_requested() {
                            break 'read;
                        }
                        self.handle_event(event);
                    }
                }
                Err(e) => {
                    if self.is_stop_requested() {
                        log::debug!("Read on '{}' ended during shutdown: {}", self.identity.path, e);
                    } else {
                        log::error!("Error reading from device '{}': {}", self.identity.path, e);
                    }
                    break;
                }
            }
        }

        if let Err(e) = device.ungrab() {
            log::warn!("Failed to release device '{}': {}", self.identity.path, e);
        }
        drop(device);
        *self.state.lock() = MonitorState::Stopped;
        log::info!("Monitor for '{}' stopped", self.identity.path);
    }

    /// Process one raw event. Returns true if a message was published.
    ///
    /// Non-key events are skipped. While disabled, key events are consumed
    /// without touching modifier state.
    pub fn handle_event(&self, event: &RawEvent) -> bool {
        if !event.is_key_event() || !self.is_enabled() {
            return false;
        }
        let Some(key_event) = KeyEvent::categorize(event) else {
            return false;
        };
        let Some(key) = self.policy.evaluate(&key_event) else {
            return false;
        };

        let message = OutboundMessage {
            key,
            device_path: self.identity.path.clone(),
            device_name: Some(self.identity.name.clone()),
        };
        let payload = match serde_json::to_vec(&message) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to encode key event: {}", e);
                return false;
            }
        };

        match self
            .transport
            .publish(&self.topics.state, &payload, QoS::AtMostOnce, false)
        {
            Ok(()) => {
                log::debug!("Published: {}", String::from_utf8_lossy(&payload));
                true
            }
            Err(e) => {
                log::warn!("Failed to publish key '{}': {}", message.key, e);
                false
            }
        }
    }

    /// Apply a switch command payload. Anything other than `ON`/`OFF`
    /// (trimmed, any case) is logged and ignored.
    pub fn handle_switch_command(&self, payload: &[u8]) {
        let text = String::from_utf8_lossy(payload);
        let command = text.trim();
        if command.eq_ignore_ascii_case(SWITCH_ON) {
            self.set_enabled(true);
        } else if command.eq_ignore_ascii_case(SWITCH_OFF) {
            self.set_enabled(false);
        } else {
            log::warn!(
                "Ignoring unknown switch command '{}' for '{}'",
                command,
                self.identity.path
            );
        }
    }

    /// Set the enable gate, echo the retained switch state and notify the
    /// change callback
    pub fn set_enabled(&self, enabled: bool) {
        {
            // Echo while holding the flag so concurrent setters cannot leave
            // the retained state disagreeing with it
            let mut current = self.enabled.lock();
            *current = enabled;
            self.publish_switch_state(enabled);
        }
        log::debug!(
            "Device '{}' {}",
            self.identity.path,
            if enabled { "enabled" } else { "disabled" }
        );
        if let Some(callback) = &self.on_enabled_change {
            callback(&self.identity.path, enabled);
        }
    }

    /// Request the worker to stop. Returns false if a stop was already
    /// requested.
    pub fn stop(&self) -> bool {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        log::info!("Stopping monitor for '{}'", self.identity.path);

        let mut state = self.state.lock();
        match *state {
            MonitorState::Running => *state = MonitorState::Stopping,
            MonitorState::Created => {
                // Never started: the device was not grabbed
                self.device.lock().take();
                *state = MonitorState::Stopped;
            }
            MonitorState::Stopping | MonitorState::Stopped => {}
        }
        true
    }

    /// Wait for the worker thread to exit
    pub fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Monitor thread for '{}' panicked", self.identity.path);
            }
        }
    }
}
