// evmqtt Configuration
// Gateway settings from TOML, JSON or Home Assistant add-on options

#[cfg(feature = "pure-rust")]
use std::env;
#[cfg(feature = "pure-rust")]
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::modifier::{DEFAULT_IGNORED_KEYS, DEFAULT_MODIFIERS};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "EVMQTT_CONFIG";

/// Options file written by the Home Assistant add-on supervisor
pub const HA_OPTIONS_PATH: &str = "/data/options.json";

/// Files tried in the working directory when nothing else is given
pub const LOCAL_CONFIG_FILES: &[&str] = &["config.local.toml", "config.toml"];

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("No configuration file found (tried: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Validated gateway configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// MQTT broker host name or address
    pub serverip: String,
    pub port: u16,
    /// Empty for anonymous access
    pub username: String,
    pub password: String,
    /// Gateway display name used in Home Assistant entity names
    pub name: String,
    /// Base topic; each device publishes below it
    pub topic: String,
    /// Device paths to monitor when not auto-discovering
    pub devices: Vec<String>,
    pub auto_discover: bool,
    /// Paths that start enabled when auto-discovering. Empty means all.
    pub enabled_devices: Vec<String>,
    /// Skip devices without key events when auto-discovering
    pub filter_keys_only: bool,
    /// Give every device its own modifier state
    pub isolate_modifiers: bool,
    pub modifiers: Vec<String>,
    pub ignored_keys: Vec<String>,
    /// Clear the retained Home Assistant discovery configs on shutdown
    pub cleanup_on_exit: bool,
}

fn default_true() -> bool {
    true
}

fn default_modifiers() -> Vec<String> {
    DEFAULT_MODIFIERS.iter().map(|s| s.to_string()).collect()
}

fn default_ignored_keys() -> Vec<String> {
    DEFAULT_IGNORED_KEYS.iter().map(|s| s.to_string()).collect()
}

/// On-disk form of [`Config`]. The port is kept wide so out-of-range values
/// are reported as invalid rather than as parse errors.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    serverip: String,
    port: i64,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    name: String,
    topic: String,
    #[serde(default)]
    devices: Vec<String>,
    #[serde(default)]
    auto_discover: bool,
    #[serde(default)]
    enabled_devices: Vec<String>,
    #[serde(default = "default_true")]
    filter_keys_only: bool,
    #[serde(default)]
    isolate_modifiers: bool,
    #[serde(default = "default_modifiers")]
    modifiers: Vec<String>,
    #[serde(default = "default_ignored_keys")]
    ignored_keys: Vec<String>,
    #[serde(default)]
    cleanup_on_exit: bool,
}

/// Home Assistant add-on options. The `mqtt_*` names win over the plain
/// ones when both are present.
#[derive(Debug, Clone, Deserialize)]
struct HaOptions {
    mqtt_host: Option<String>,
    serverip: Option<String>,
    mqtt_port: Option<i64>,
    port: Option<i64>,
    mqtt_username: Option<String>,
    username: Option<String>,
    mqtt_password: Option<String>,
    password: Option<String>,
    #[serde(default = "default_ha_name")]
    name: String,
    #[serde(default = "default_ha_topic")]
    topic: String,
    #[serde(default)]
    devices: Vec<String>,
    #[serde(default)]
    auto_discover: bool,
    #[serde(default)]
    enabled_devices: Vec<String>,
    #[serde(default = "default_true")]
    filter_keys_only: bool,
    #[serde(default)]
    isolate_modifiers: bool,
    #[serde(default = "default_modifiers")]
    modifiers: Vec<String>,
    #[serde(default = "default_ignored_keys")]
    ignored_keys: Vec<String>,
    #[serde(default)]
    cleanup_on_exit: bool,
}

fn default_ha_name() -> String {
    "evmqtt".to_string()
}

fn default_ha_topic() -> String {
    "homeassistant/sensor/evmqtt".to_string()
}

impl From<HaOptions> for ConfigFile {
    fn from(options: HaOptions) -> Self {
        Self {
            serverip: options.mqtt_host.or(options.serverip).unwrap_or_default(),
            port: options.mqtt_port.or(options.port).unwrap_or(1883),
            username: options.mqtt_username.or(options.username).unwrap_or_default(),
            password: options.mqtt_password.or(options.password).unwrap_or_default(),
            name: options.name,
            topic: options.topic,
            devices: options.devices,
            auto_discover: options.auto_discover,
            enabled_devices: options.enabled_devices,
            filter_keys_only: options.filter_keys_only,
            isolate_modifiers: options.isolate_modifiers,
            modifiers: options.modifiers,
            ignored_keys: options.ignored_keys,
            cleanup_on_exit: options.cleanup_on_exit,
        }
    }
}

impl ConfigFile {
    fn into_config(self) -> Result<Config, ConfigError> {
        if !(1..=65535).contains(&self.port) {
            return Err(ConfigError::Invalid(format!(
                "port must be between 1 and 65535, got {}",
                self.port
            )));
        }
        let port = u16::try_from(self.port)
            .map_err(|_| ConfigError::Invalid(format!("port out of range: {}", self.port)))?;

        let config = Config {
            serverip: self.serverip,
            port,
            username: self.username,
            password: self.password,
            name: self.name,
            topic: self.topic,
            devices: self.devices,
            auto_discover: self.auto_discover,
            enabled_devices: self.enabled_devices,
            filter_keys_only: self.filter_keys_only,
            isolate_modifiers: self.isolate_modifiers,
            modifiers: self.modifiers,
            ignored_keys: self.ignored_keys,
            cleanup_on_exit: self.cleanup_on_exit,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Check the invariants that deserialization cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serverip.trim().is_empty() {
            return Err(ConfigError::Invalid("serverip cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid(
                "port must be between 1 and 65535, got 0".to_string(),
            ));
        }
        if self.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("topic cannot be empty".to_string()));
        }
        if !self.auto_discover && self.devices.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one device must be specified when auto_discover is disabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy with the password masked, for logging
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.password.is_empty() {
            config.password = "***".to_string();
        }
        config
    }

    /// Parse configuration from JSON text
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<json>".to_string(),
            message: e.to_string(),
        })?;
        file.into_config()
    }

    /// Parse Home Assistant add-on options
    pub fn from_ha_options(content: &str) -> Result<Self, ConfigError> {
        let options: HaOptions = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: HA_OPTIONS_PATH.to_string(),
            message: e.to_string(),
        })?;
        ConfigFile::from(options).into_config()
    }

    /// Parse configuration from TOML text
    #[cfg(feature = "pure-rust")]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<toml>".to_string(),
            message: e.to_string(),
        })?;
        file.into_config()
    }

    /// Load a config file. `.json` files are parsed as JSON (the add-on
    /// options file with its aliases), everything else as TOML.
    #[cfg(feature = "pure-rust")]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let result = if is_json(path) {
            Self::from_ha_options(&content)
        } else {
            Self::from_toml(&content)
        };
        result.map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Locate and load the configuration.
    ///
    /// Search order: `explicit`, then `$EVMQTT_CONFIG`, then the Home
    /// Assistant options file, then `config.local.toml` and `config.toml`
    /// in the working directory.
    #[cfg(feature = "pure-rust")]
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        let candidates = candidate_paths(explicit, env_path);

        // An explicitly named file must exist
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
        }

        for path in &candidates {
            if path.exists() {
                log::info!("Loading configuration from {}", path.display());
                return Self::from_path(path);
            }
        }

        let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(ConfigError::NotFound(tried.join(", ")))
    }
}

#[cfg(feature = "pure-rust")]
fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Config file locations in search order
pub fn candidate_paths(explicit: Option<&Path>, env_path: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = explicit {
        paths.push(path.to_path_buf());
    }
    if let Some(path) = env_path {
        paths.push(path);
    }
    paths.push(PathBuf::from(HA_OPTIONS_PATH));
    paths.extend(LOCAL_CONFIG_FILES.iter().map(PathBuf::from));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_JSON: &str = r#"{
        "serverip": "192.168.1.10",
        "port": 1883,
        "username": "mqtt",
        "password": "secret",
        "name": "Living Room",
        "topic": "homeassistant/sensor/evmqtt",
        "devices": ["/dev/input/event0"]
    }"#;

    #[test]
    fn test_from_json_defaults() {
        let config = Config::from_json(MINIMAL_JSON).unwrap();
        assert_eq!(config.serverip, "192.168.1.10");
        assert_eq!(config.port, 1883);
        assert_eq!(config.devices, vec!["/dev/input/event0"]);
        assert!(!config.auto_discover);
        assert!(config.filter_keys_only);
        assert!(!config.isolate_modifiers);
        assert!(config.enabled_devices.is_empty());
        assert_eq!(config.modifiers.len(), 8);
        assert_eq!(config.ignored_keys, vec!["KEY_NUMLOCK"]);
        assert!(!config.cleanup_on_exit);
    }

    #[test]
    fn test_cleanup_on_exit_opt_in() {
        let json = MINIMAL_JSON.replace("\"port\": 1883,", "\"port\": 1883, \"cleanup_on_exit\": true,");
        assert!(Config::from_json(&json).unwrap().cleanup_on_exit);

        let options = r#"{"mqtt_host": "broker", "devices": ["/dev/input/event0"], "cleanup_on_exit": true}"#;
        assert!(Config::from_ha_options(options).unwrap().cleanup_on_exit);
    }

    #[test]
    fn test_redacted_masks_password() {
        let mut config = Config::from_json(MINIMAL_JSON).unwrap();
        let redacted = config.redacted();
        assert_eq!(redacted.password, "***");
        assert_eq!(redacted.username, "mqtt");
        assert_eq!(config.password, "secret");

        config.password.clear();
        assert_eq!(config.redacted().password, "");
    }

    #[test]
    fn test_invalid_port() {
        for port in ["0", "65536", "-1"] {
            let json = MINIMAL_JSON.replace("1883", port);
            assert!(
                matches!(Config::from_json(&json), Err(ConfigError::Invalid(_))),
                "port {}",
                port
            );
        }
    }

    #[test]
    fn test_empty_serverip_and_topic() {
        let json = MINIMAL_JSON.replace("192.168.1.10", "");
        assert!(matches!(Config::from_json(&json), Err(ConfigError::Invalid(_))));

        let json = MINIMAL_JSON.replace("homeassistant/sensor/evmqtt", "");
        assert!(matches!(Config::from_json(&json), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_devices_required_without_auto_discover() {
        let json = MINIMAL_JSON.replace(r#"["/dev/input/event0"]"#, "[]");
        match Config::from_json(&json) {
            Err(ConfigError::Invalid(message)) => assert!(message.contains("auto_discover")),
            other => panic!("unexpected result: {:?}", other),
        }

        let json = json.replace(r#""devices": []"#, r#""devices": [], "auto_discover": true"#);
        assert!(Config::from_json(&json).unwrap().auto_discover);
    }

    #[test]
    fn test_missing_required_field() {
        let json = r#"{"serverip": "broker", "port": 1883}"#;
        assert!(matches!(Config::from_json(json), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_ha_options_aliases_and_defaults() {
        let options = r#"{
            "mqtt_host": "core-mosquitto",
            "serverip": "ignored",
            "mqtt_username": "addon",
            "mqtt_password": "pw",
            "auto_discover": true,
            "enabled_devices": ["/dev/input/event2"]
        }"#;
        let config = Config::from_ha_options(options).unwrap();
        assert_eq!(config.serverip, "core-mosquitto");
        assert_eq!(config.port, 1883);
        assert_eq!(config.username, "addon");
        assert_eq!(config.password, "pw");
        assert_eq!(config.name, "evmqtt");
        assert_eq!(config.topic, "homeassistant/sensor/evmqtt");
        assert_eq!(config.enabled_devices, vec!["/dev/input/event2"]);
    }

    #[test]
    fn test_ha_options_requires_host() {
        let options = r#"{"auto_discover": true}"#;
        assert!(matches!(
            Config::from_ha_options(options),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_candidate_order() {
        let paths = candidate_paths(
            Some(Path::new("/etc/evmqtt.toml")),
            Some(PathBuf::from("/tmp/env.toml")),
        );
        let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "/etc/evmqtt.toml",
                "/tmp/env.toml",
                "/data/options.json",
                "config.local.toml",
                "config.toml",
            ]
        );
        assert_eq!(candidate_paths(None, None).len(), 3);
    }

    #[cfg(feature = "pure-rust")]
    #[test]
    fn test_from_toml() {
        let toml = r#"
            serverip = "broker.local"
            port = 8883
            name = "Desk"
            topic = "evmqtt"
            auto_discover = true
            isolate_modifiers = true
            ignored_keys = ["KEY_NUMLOCK", "KEY_CAPSLOCK"]
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.port, 8883);
        assert_eq!(config.username, "");
        assert!(config.isolate_modifiers);
        assert_eq!(config.ignored_keys, vec!["KEY_NUMLOCK", "KEY_CAPSLOCK"]);
    }

    #[cfg(feature = "pure-rust")]
    #[test]
    fn test_toml_unknown_field_rejected() {
        let toml = r#"
            serverip = "broker.local"
            port = 1883
            name = "Desk"
            topic = "evmqtt"
            auto_discover = true
            colour = "blue"
        "#;
        assert!(matches!(Config::from_toml(toml), Err(ConfigError::Parse { .. })));
    }

    #[cfg(feature = "pure-rust")]
    #[test]
    fn test_load_explicit_missing() {
        let missing = Path::new("/nonexistent/evmqtt/config.toml");
        assert!(matches!(Config::load(Some(missing)), Err(ConfigError::NotFound(_))));
    }

    #[cfg(feature = "pure-rust")]
    #[test]
    fn test_from_path_json_and_toml() {
        let dir = env::temp_dir().join(format!("evmqtt-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let json_path = dir.join("options.json");
        fs::write(&json_path, r#"{"mqtt_host": "h", "devices": ["/dev/input/event1"]}"#).unwrap();
        assert_eq!(Config::from_path(&json_path).unwrap().serverip, "h");

        let toml_path = dir.join("config.toml");
        fs::write(&toml_path, "serverip = \"h\"\nport = 1\nname = \"n\"\ntopic = \"t\"\nauto_discover = true\n").unwrap();
        assert_eq!(Config::from_path(&toml_path).unwrap().port, 1);

        fs::write(&toml_path, "serverip = ").unwrap();
        match Config::from_path(&toml_path) {
            Err(ConfigError::Parse { path, .. }) => assert!(path.ends_with("config.toml")),
            other => panic!("unexpected result: {:?}", other),
        }

        fs::remove_dir_all(&dir).unwrap();
    }
}
