// evmqtt Core Library
// Input device key events to MQTT with Home Assistant discovery

pub mod config;
pub mod controller;
pub mod device;
pub mod discovery;
pub mod event;
pub mod key;
pub mod keystate;
pub mod modifier;
pub mod monitor;
pub mod policy;
pub mod transport;

pub use config::{Config, ConfigError};
pub use controller::{GatewayController, GatewayError};
pub use device::{
    DeviceDescriptor, DeviceError, DeviceIdentity, DeviceProvider, DeviceResult, DeviceScript,
    InputDevice, MemoryProvider, ScriptedDevice,
};
pub use discovery::{discover, list_devices, slugify, DiscoveredDevice};
pub use event::{is_key_event, KeyEvent, RawEvent, EV_KEY};
pub use key::{key_name, key_names, KeyCodes};
pub use keystate::KeyState;
pub use modifier::{ModifierTracker, DEFAULT_IGNORED_KEYS, DEFAULT_MODIFIERS};
pub use monitor::{
    DeviceMonitor, EnabledCallback, MonitorConfig, MonitorError, MonitorState, MonitorTopics,
    OutboundMessage,
};
pub use policy::KeyEventPolicy;
pub use transport::{
    topic_matches, MemoryTransport, MessageHandler, PublishedMessage, QoS, SubscriptionRegistry,
    Transport, TransportError, TransportResult,
};

#[cfg(feature = "pure-rust")]
pub use device::{EvdevDevice, EvdevProvider};
#[cfg(feature = "pure-rust")]
pub use transport::{generate_client_id, MqttSettings, MqttTransport};
