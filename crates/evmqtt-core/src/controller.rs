// evmqtt Gateway Controller
// Builds one monitor per device and coordinates startup and shutdown

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::device::{DeviceError, DeviceProvider};
use crate::discovery::{self, initially_enabled};
use crate::modifier::ModifierTracker;
use crate::monitor::{DeviceMonitor, EnabledCallback, MonitorConfig};
use crate::policy::KeyEventPolicy;
use crate::transport::{MessageHandler, Transport};

/// Errors that abort gateway startup
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("No input devices available")]
    NoDevices,

    #[error("Gateway already started")]
    AlreadyStarted,

    #[error("Gateway is shutting down")]
    ShuttingDown,

    #[error("Device discovery failed: {0}")]
    Discovery(#[from] DeviceError),
}

/// A device chosen for monitoring, before it is opened
#[derive(Debug, Clone)]
struct PlannedDevice {
    path: String,
    config: MonitorConfig,
}

/// Owns every [`DeviceMonitor`] and the transport they publish through.
///
/// Monitors are keyed by device path; a path never maps to more than one
/// monitor. `start` and `stop` are serialized, so a stop requested while
/// startup is in flight takes effect once startup has finished.
pub struct GatewayController {
    config: Config,
    transport: Arc<dyn Transport>,
    provider: Arc<dyn DeviceProvider>,
    policy: KeyEventPolicy,
    monitors: Mutex<BTreeMap<String, Arc<DeviceMonitor>>>,
    on_enabled_change: Option<EnabledCallback>,
    started: AtomicBool,
    shutdown_requested: AtomicBool,
    lifecycle: Mutex<()>,
}

impl GatewayController {
    pub fn new(config: Config, transport: Arc<dyn Transport>, provider: Arc<dyn DeviceProvider>) -> Self {
        let tracker = ModifierTracker::new(config.modifiers.iter().cloned(), config.ignored_keys.iter().cloned());
        Self {
            policy: KeyEventPolicy::new(tracker),
            config,
            transport,
            provider,
            monitors: Mutex::new(BTreeMap::new()),
            on_enabled_change: None,
            started: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    /// Extra observer for switch changes, e.g. to persist them
    pub fn with_enabled_callback(mut self, callback: EnabledCallback) -> Self {
        self.on_enabled_change = Some(callback);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The policy shared by all monitors unless modifiers are isolated
    pub fn policy(&self) -> &KeyEventPolicy {
        &self.policy
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.lock().len()
    }

    pub fn monitor(&self, path: &str) -> Option<Arc<DeviceMonitor>> {
        self.monitors.lock().get(path).cloned()
    }

    /// All monitors in path order
    pub fn monitors(&self) -> Vec<Arc<DeviceMonitor>> {
        self.monitors.lock().values().cloned().collect()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    fn plan(&self) -> Result<Vec<PlannedDevice>, GatewayError> {
        if self.config.auto_discover {
            log::info!("Auto-discovering input devices...");
            let discovered = discovery::discover(self.provider.as_ref(), self.config.filter_keys_only)?;
            if discovered.is_empty() {
                log::warn!("No input devices discovered");
            }

            Ok(discovered
                .into_iter()
                .map(|device| {
                    log::info!("  {} ({}) -> {}", device.name, device.path, device.slug);
                    let enabled = initially_enabled(&device.path, &self.config.enabled_devices);
                    PlannedDevice {
                        config: self
                            .monitor_config()
                            .with_slug(device.slug, device.unique_id)
                            .enabled(enabled),
                        path: device.path,
                    }
                })
                .collect())
        } else {
            match discovery::list_devices(self.provider.as_ref()) {
                Ok(available) => {
                    log::info!("Found {} available input device(s):", available.len());
                    for (path, name) in available {
                        log::info!("  Path: {}, Name: {}", path, name);
                    }
                }
                Err(e) => log::debug!("Could not list input devices: {}", e),
            }

            Ok(self
                .config
                .devices
                .iter()
                .map(|path| PlannedDevice {
                    path: path.clone(),
                    config: self.monitor_config(),
                })
                .collect())
        }
    }

    fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::new(self.config.topic.clone(), self.config.name.clone())
    }

    fn enabled_callback(&self) -> EnabledCallback {
        let external = self.on_enabled_change.clone();
        Arc::new(move |path: &str, enabled: bool| {
            log::info!("Device '{}' enabled state changed to: {}", path, enabled);
            if let Some(callback) = &external {
                callback(path, enabled);
            }
        })
    }

    /// Open every configured or discovered device, subscribe to each
    /// monitor's switch commands, then start the monitors.
    ///
    /// Devices that cannot be opened are logged and skipped. Fails if no
    /// device could be opened at all, or if `stop` was already called.
    /// Returns the number of monitors created.
    pub fn start(&self) -> Result<usize, GatewayError> {
        let _lifecycle = self.lifecycle.lock();
        if self.is_shutdown_requested() {
            return Err(GatewayError::ShuttingDown);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::AlreadyStarted);
        }

        let created = self.create_monitors(self.plan()?);
        if created.is_empty() {
            log::error!("No input devices available");
            return Err(GatewayError::NoDevices);
        }
        // A stop requested while devices were opened waits on the lifecycle
        // lock and stops the monitors created so far
        if self.is_shutdown_requested() {
            log::info!("Shutdown requested during startup; not starting monitors");
            return Err(GatewayError::ShuttingDown);
        }

        for monitor in &created {
            self.subscribe_switch(monitor);
        }
        for monitor in &created {
            // A grab failure only takes out this monitor
            if let Err(e) = monitor.start() {
                log::error!("Monitor for '{}' did not start: {}", monitor.path(), e);
            }
        }

        log::info!("Gateway started with {} monitor(s)", created.len());
        Ok(created.len())
    }

    fn create_monitors(&self, plan: Vec<PlannedDevice>) -> Vec<Arc<DeviceMonitor>> {
        let mut monitors = self.monitors.lock();
        let mut created = Vec::new();

        for planned in plan {
            if monitors.contains_key(&planned.path) {
                log::warn!("Device '{}' listed more than once; ignoring duplicate", planned.path);
                continue;
            }

            let device = match self.provider.open(&planned.path) {
                Ok(device) => device,
                Err(DeviceError::NotFound(path)) => {
                    log::error!("Device not found: {}", path);
                    continue;
                }
                Err(DeviceError::PermissionDenied(path)) => {
                    log::error!("Permission denied for device: {}", path);
                    continue;
                }
                Err(e) => {
                    log::error!("Error opening device {}: {}", planned.path, e);
                    continue;
                }
            };

            let policy = if self.config.isolate_modifiers {
                self.policy.isolated()
            } else {
                self.policy.clone()
            };
            let monitor = Arc::new(
                DeviceMonitor::new(device, planned.config, self.transport.clone(), policy)
                    .with_enabled_callback(self.enabled_callback()),
            );
            monitors.insert(planned.path, monitor.clone());
            created.push(monitor);
        }
        created
    }

    fn subscribe_switch(&self, monitor: &Arc<DeviceMonitor>) {
        // Weak, so a retained subscription does not keep the monitor alive
        let target = Arc::downgrade(monitor);
        let handler: MessageHandler = Arc::new(move |_: &str, payload: &[u8]| {
            if let Some(monitor) = target.upgrade() {
                monitor.handle_switch_command(payload);
            }
        });

        let topic = &monitor.topics().switch_command;
        match self.transport.subscribe(topic, handler) {
            Ok(()) => log::debug!(
                "Subscribed to switch commands for '{}' on '{}'",
                monitor.name(),
                topic
            ),
            Err(e) => log::error!("Failed to subscribe to '{}': {}", topic, e),
        }
    }

    /// Stop every monitor, then disconnect the transport. Only the first
    /// call has any effect; returns false for repeated calls.
    ///
    /// With `cleanup_on_exit` set, each monitor's discovery configs are
    /// cleared before the transport goes away.
    pub fn stop(&self) -> bool {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        log::info!("Shutting down...");
        let _lifecycle = self.lifecycle.lock();

        let monitors = self.monitors();
        for monitor in &monitors {
            monitor.stop();
        }
        if self.config.cleanup_on_exit {
            for monitor in &monitors {
                monitor.cleanup_autodiscovery();
            }
        }
        if let Err(e) = self.transport.disconnect() {
            log::warn!("Error disconnecting transport: {}", e);
        }

        log::info!("Shutdown complete");
        true
    }

    /// Block until every monitor's worker has exited
    pub fn wait(&self) {
        for monitor in self.monitors() {
            monitor.join();
        }
    }
}
