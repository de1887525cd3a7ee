// evmqtt Gateway Scenarios
// End-to-end tests from scripted device events to published MQTT messages

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use evmqtt_core::{
    Config, DeviceScript, GatewayController, GatewayError, MemoryProvider, MemoryTransport,
    MonitorState, QoS,
};

const EVENT0: &str = "/dev/input/event0";
const EVENT1: &str = "/dev/input/event1";
const STATE0: &str = "evmqtt/dev_input_event0/state";
const STATE1: &str = "evmqtt/dev_input_event1/state";
const SWITCH0: &str = "evmqtt/dev_input_event0/switch/set";
const SWITCH_STATE0: &str = "evmqtt/dev_input_event0/switch/state";

const KEY_A: u16 = 30;
const KEY_B: u16 = 48;
const KEY_LEFTSHIFT: u16 = 42;
const KEY_MUTE: u16 = 113;

fn manual_config(devices: &[&str]) -> Config {
    let devices: Vec<String> = devices.iter().map(|d| format!("\"{}\"", d)).collect();
    Config::from_json(&format!(
        r#"{{
            "serverip": "localhost",
            "port": 1883,
            "name": "Test Gateway",
            "topic": "evmqtt",
            "devices": [{}]
        }}"#,
        devices.join(", ")
    ))
    .unwrap()
}

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn keys_on(transport: &MemoryTransport, topic: &str) -> Vec<String> {
    transport
        .published_to(topic)
        .iter()
        .filter_map(|m| m.json())
        .filter_map(|v| v["key"].as_str().map(str::to_string))
        .collect()
}

struct Gateway {
    controller: GatewayController,
    transport: Arc<MemoryTransport>,
    provider: Arc<MemoryProvider>,
}

impl Gateway {
    fn new(config: Config) -> Self {
        let transport = Arc::new(MemoryTransport::connected());
        let provider = Arc::new(MemoryProvider::new());
        let controller = GatewayController::new(config, transport.clone(), provider.clone());
        Self {
            controller,
            transport,
            provider,
        }
    }

    fn add(&self, path: &str, name: &str) -> DeviceScript {
        self.provider.add_device(path, name, true)
    }

    fn shutdown(&self) {
        self.controller.stop();
        self.controller.wait();
    }
}

#[test]
fn test_shift_a_publishes_modifier_suffix() {
    let gateway = Gateway::new(manual_config(&[EVENT0]));
    let script = gateway.add(EVENT0, "USB Keyboard");
    gateway.controller.start().unwrap();

    script.press(KEY_LEFTSHIFT);
    script.press(KEY_A);
    assert!(wait_for(|| !gateway.transport.published_to(STATE0).is_empty()));

    let messages = gateway.transport.published_to(STATE0);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].qos, QoS::AtMostOnce);
    assert!(!messages[0].retain);

    let body = messages[0].json().unwrap();
    assert_eq!(body["key"], "KEY_A_KEY_LEFTSHIFT");
    assert_eq!(body["devicePath"], EVENT0);
    assert_eq!(body["deviceName"], "USB Keyboard");

    gateway.shutdown();
}

#[test]
fn test_press_and_release_publish_once() {
    let gateway = Gateway::new(manual_config(&[EVENT0]));
    let script = gateway.add(EVENT0, "kbd");
    gateway.controller.start().unwrap();

    script.press(KEY_A);
    script.key(KEY_A, 2);
    script.release(KEY_A);
    script.press(KEY_B);
    assert!(wait_for(|| keys_on(&gateway.transport, STATE0).len() == 2));
    assert_eq!(keys_on(&gateway.transport, STATE0), vec!["KEY_A", "KEY_B"]);

    gateway.shutdown();
}

#[test]
fn test_aliased_code_joins_names() {
    let gateway = Gateway::new(manual_config(&[EVENT0]));
    let script = gateway.add(EVENT0, "remote");
    gateway.controller.start().unwrap();

    script.press(KEY_MUTE);
    assert!(wait_for(|| !keys_on(&gateway.transport, STATE0).is_empty()));
    assert_eq!(
        keys_on(&gateway.transport, STATE0),
        vec!["KEY_MUTE|KEY_MIN_INTERESTING"]
    );

    gateway.shutdown();
}

#[test]
fn test_startup_publishes_retained_discovery() {
    let gateway = Gateway::new(manual_config(&[EVENT0]));
    let _script = gateway.add(EVENT0, "kbd");
    gateway.controller.start().unwrap();

    let sensor = gateway.transport.published_to("evmqtt/dev_input_event0/config");
    assert_eq!(sensor.len(), 1);
    assert!(sensor[0].retain);
    let sensor = sensor[0].json().unwrap();
    assert_eq!(sensor["name"], "Test Gateway - kbd");
    assert_eq!(sensor["state_topic"], STATE0);

    let switch = gateway
        .transport
        .published_to("homeassistant/switch/evmqtt__dev_input_event0/config");
    assert_eq!(switch.len(), 1);
    assert!(switch[0].retain);
    assert_eq!(switch[0].json().unwrap()["command_topic"], SWITCH0);

    let state = gateway.transport.published_to(SWITCH_STATE0);
    assert_eq!(state.len(), 1);
    assert_eq!(state[0].text(), "ON");
    assert!(state[0].retain);

    assert_eq!(gateway.transport.subscriptions(), vec![SWITCH0.to_string()]);
    gateway.shutdown();
}

#[test]
fn test_switch_off_via_transport() {
    let gateway = Gateway::new(manual_config(&[EVENT0]));
    let script = gateway.add(EVENT0, "kbd");
    gateway.controller.start().unwrap();
    let monitor = gateway.controller.monitor(EVENT0).unwrap();
    gateway.transport.clear();

    assert_eq!(gateway.transport.deliver(SWITCH0, b"off"), 1);
    assert!(!monitor.is_enabled());

    let state = gateway.transport.published_to(SWITCH_STATE0);
    assert_eq!(state.len(), 1);
    assert_eq!(state[0].text(), "OFF");
    assert!(state[0].retain);

    // Held modifiers are not tracked while disabled
    script.press(KEY_LEFTSHIFT);
    script.press(KEY_A);
    thread::sleep(Duration::from_millis(300));
    assert!(gateway.transport.published_to(STATE0).is_empty());
    assert!(gateway.controller.policy().active_modifiers().is_empty());

    gateway.transport.deliver(SWITCH0, b" ON ");
    assert!(monitor.is_enabled());
    script.press(KEY_B);
    assert!(wait_for(|| !keys_on(&gateway.transport, STATE0).is_empty()));
    assert_eq!(keys_on(&gateway.transport, STATE0), vec!["KEY_B"]);

    gateway.shutdown();
}

#[test]
fn test_unknown_switch_payload_ignored() {
    let gateway = Gateway::new(manual_config(&[EVENT0]));
    let _script = gateway.add(EVENT0, "kbd");
    gateway.controller.start().unwrap();
    gateway.transport.clear();

    gateway.transport.deliver(SWITCH0, b"toggle");
    let monitor = gateway.controller.monitor(EVENT0).unwrap();
    assert!(monitor.is_enabled());
    assert!(gateway.transport.published_to(SWITCH_STATE0).is_empty());

    gateway.shutdown();
}

#[test]
fn test_shared_modifiers_across_devices() {
    let gateway = Gateway::new(manual_config(&[EVENT0, EVENT1]));
    let left = gateway.add(EVENT0, "left");
    let right = gateway.add(EVENT1, "right");
    assert_eq!(gateway.controller.start().unwrap(), 2);

    left.press(KEY_LEFTSHIFT);
    assert!(wait_for(|| !gateway.controller.policy().active_modifiers().is_empty()));
    right.press(KEY_A);
    assert!(wait_for(|| !keys_on(&gateway.transport, STATE1).is_empty()));
    assert_eq!(keys_on(&gateway.transport, STATE1), vec!["KEY_A_KEY_LEFTSHIFT"]);

    gateway.shutdown();
}

#[test]
fn test_stop_twice_disconnects_once() {
    let gateway = Gateway::new(manual_config(&[EVENT0, EVENT1]));
    let _left = gateway.add(EVENT0, "left");
    let _right = gateway.add(EVENT1, "right");
    gateway.controller.start().unwrap();

    assert!(gateway.controller.stop());
    assert!(!gateway.controller.stop());
    gateway.controller.wait();

    assert_eq!(gateway.transport.disconnect_count(), 1);
    for monitor in gateway.controller.monitors() {
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }
}

#[test]
fn test_stop_releases_grab() {
    let gateway = Gateway::new(manual_config(&[EVENT0]));
    let script = gateway.add(EVENT0, "kbd");
    gateway.controller.start().unwrap();
    assert!(script.is_grabbed());

    gateway.shutdown();
    assert!(!script.is_grabbed());
    assert_eq!(script.ungrab_count(), 1);
}

#[test]
fn test_no_usable_devices() {
    let gateway = Gateway::new(manual_config(&[EVENT0, EVENT1]));
    gateway
        .provider
        .add_failing(EVENT1, "locked", io::ErrorKind::PermissionDenied);

    assert!(matches!(
        gateway.controller.start(),
        Err(GatewayError::NoDevices)
    ));
    assert!(gateway.transport.published().is_empty());
}

#[test]
fn test_unopenable_device_skipped() {
    let gateway = Gateway::new(manual_config(&[EVENT0, EVENT1]));
    gateway
        .provider
        .add_failing(EVENT0, "locked", io::ErrorKind::PermissionDenied);
    let script = gateway.add(EVENT1, "kbd");

    assert_eq!(gateway.controller.start().unwrap(), 1);
    assert!(gateway.controller.monitor(EVENT0).is_none());

    script.press(KEY_A);
    assert!(wait_for(|| !keys_on(&gateway.transport, STATE1).is_empty()));
    gateway.shutdown();
}

#[test]
fn test_grab_failure_isolated() {
    let gateway = Gateway::new(manual_config(&[EVENT0, EVENT1]));
    let busy = gateway.add(EVENT0, "busy");
    busy.fail_grab(true);
    let healthy = gateway.add(EVENT1, "healthy");

    assert_eq!(gateway.controller.start().unwrap(), 2);
    let failed = gateway.controller.monitor(EVENT0).unwrap();
    assert_eq!(failed.state(), MonitorState::Stopped);
    assert!(gateway
        .transport
        .published_to("evmqtt/dev_input_event0/config")
        .is_empty());

    healthy.press(KEY_A);
    assert!(wait_for(|| !keys_on(&gateway.transport, STATE1).is_empty()));
    gateway.shutdown();
}

#[test]
fn test_read_error_ends_one_monitor() {
    let gateway = Gateway::new(manual_config(&[EVENT0, EVENT1]));
    let broken = gateway.add(EVENT0, "broken");
    let healthy = gateway.add(EVENT1, "healthy");
    gateway.controller.start().unwrap();

    broken.fail(io::ErrorKind::BrokenPipe);
    let failed = gateway.controller.monitor(EVENT0).unwrap();
    assert!(wait_for(|| failed.state() == MonitorState::Stopped));
    assert_eq!(broken.ungrab_count(), 1);

    let alive = gateway.controller.monitor(EVENT1).unwrap();
    assert_eq!(alive.state(), MonitorState::Running);
    healthy.press(KEY_B);
    assert!(wait_for(|| keys_on(&gateway.transport, STATE1) == vec!["KEY_B"]));

    gateway.shutdown();
}

#[test]
fn test_read_error_during_shutdown_is_quiet() {
    let gateway = Gateway::new(manual_config(&[EVENT0]));
    let script = gateway.add(EVENT0, "kbd");
    gateway.controller.start().unwrap();
    let monitor = gateway.controller.monitor(EVENT0).unwrap();

    assert!(monitor.stop());
    script.fail(io::ErrorKind::BrokenPipe);
    monitor.join();

    assert_eq!(monitor.state(), MonitorState::Stopped);
    assert!(monitor.is_stop_requested());
    assert!(!script.is_grabbed());
    assert_eq!(script.ungrab_count(), 1);

    gateway.shutdown();
    assert_eq!(script.ungrab_count(), 1);
}

#[test]
fn test_stop_before_start_leaves_devices_untouched() {
    let gateway = Gateway::new(manual_config(&[EVENT0]));
    let script = gateway.add(EVENT0, "kbd");

    assert!(gateway.controller.stop());
    assert!(matches!(
        gateway.controller.start(),
        Err(GatewayError::ShuttingDown)
    ));
    gateway.controller.wait();

    assert_eq!(gateway.controller.monitor_count(), 0);
    assert_eq!(script.grab_count(), 0);
    assert!(gateway.transport.published().is_empty());
}

#[test]
fn test_auto_discover_slugs_and_enabled_devices() {
    let config = Config::from_json(&format!(
        r#"{{
            "serverip": "localhost",
            "port": 1883,
            "name": "Den",
            "topic": "evmqtt",
            "auto_discover": true,
            "enabled_devices": ["{}"]
        }}"#,
        EVENT1
    ))
    .unwrap();
    let gateway = Gateway::new(config);
    let _first = gateway.add(EVENT0, "IR Remote");
    let second = gateway.add(EVENT1, "IR Remote");
    gateway
        .provider
        .add_device("/dev/input/event2", "Accelerometer", false);

    assert_eq!(gateway.controller.start().unwrap(), 2);

    let first = gateway.controller.monitor(EVENT0).unwrap();
    assert_eq!(first.slug(), Some("ir-remote"));
    assert_eq!(first.unique_id(), "evmqtt_ir-remote_event0");
    assert!(!first.is_enabled());

    let remote = gateway.controller.monitor(EVENT1).unwrap();
    assert_eq!(remote.slug(), Some("ir-remote-2"));
    assert!(remote.is_enabled());
    assert_eq!(
        gateway.transport.published_to("evmqtt/ir-remote/switch/state")[0].text(),
        "OFF"
    );

    second.press(KEY_A);
    assert!(wait_for(|| !keys_on(&gateway.transport, "evmqtt/ir-remote-2/state").is_empty()));
    assert!(gateway.controller.monitor("/dev/input/event2").is_none());

    gateway.shutdown();
}

#[test]
fn test_enabled_callback_observes_switch() {
    let changes = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let recorded = changes.clone();

    let transport = Arc::new(MemoryTransport::connected());
    let provider = Arc::new(MemoryProvider::new());
    let _script = provider.add_device(EVENT0, "kbd", true);
    let controller = GatewayController::new(manual_config(&[EVENT0]), transport.clone(), provider)
        .with_enabled_callback(Arc::new(move |path: &str, enabled: bool| {
            recorded.lock().push((path.to_string(), enabled));
        }));
    controller.start().unwrap();

    transport.deliver(SWITCH0, b"OFF");
    transport.deliver(SWITCH0, b"on");
    assert_eq!(
        *changes.lock(),
        vec![(EVENT0.to_string(), false), (EVENT0.to_string(), true)]
    );

    controller.stop();
    controller.wait();
}
