// evmqtt Scripted Devices
// In-memory input devices fed from a channel, for tests and dry runs

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{DeviceDescriptor, DeviceError, DeviceIdentity, DeviceProvider, DeviceResult, InputDevice};
use crate::event::RawEvent;

enum Scripted {
    Event(RawEvent),
    Fail(io::ErrorKind),
}

#[derive(Default)]
struct DeviceCounters {
    grabs: AtomicUsize,
    ungrabs: AtomicUsize,
    grabbed: AtomicBool,
    fail_grab: AtomicBool,
}

/// Feeding end of a [`ScriptedDevice`].
///
/// Dropping the script makes the device report a read error, the same way a
/// real device that is unplugged does.
pub struct DeviceScript {
    sender: Sender<Scripted>,
    counters: Arc<DeviceCounters>,
}

impl DeviceScript {
    pub fn push(&self, event: RawEvent) {
        // The device may already be gone; scripted input is then discarded
        let _ = self.sender.send(Scripted::Event(event));
    }

    /// Queue an EV_KEY event
    pub fn key(&self, code: u16, value: i32) {
        self.push(RawEvent::key(code, value));
    }

    pub fn press(&self, code: u16) {
        self.key(code, 1);
    }

    pub fn release(&self, code: u16) {
        self.key(code, 0);
    }

    /// Queue a read error
    pub fn fail(&self, kind: io::ErrorKind) {
        let _ = self.sender.send(Scripted::Fail(kind));
    }

    /// Make subsequent `grab` calls fail
    pub fn fail_grab(&self, fail: bool) {
        self.counters.fail_grab.store(fail, Ordering::SeqCst);
    }

    pub fn grab_count(&self) -> usize {
        self.counters.grabs.load(Ordering::SeqCst)
    }

    pub fn ungrab_count(&self) -> usize {
        self.counters.ungrabs.load(Ordering::SeqCst)
    }

    pub fn is_grabbed(&self) -> bool {
        self.counters.grabbed.load(Ordering::SeqCst)
    }
}

/// An input device whose events come from a [`DeviceScript`]
pub struct ScriptedDevice {
    identity: DeviceIdentity,
    receiver: Receiver<Scripted>,
    counters: Arc<DeviceCounters>,
    pending_error: Option<io::ErrorKind>,
}

impl ScriptedDevice {
    pub fn new(path: &str, name: &str) -> (Self, DeviceScript) {
        let (sender, receiver) = mpsc::channel();
        let counters = Arc::new(DeviceCounters::default());
        let device = Self {
            identity: DeviceIdentity::new(path, name),
            receiver,
            counters: counters.clone(),
            pending_error: None,
        };
        (device, DeviceScript { sender, counters })
    }

    fn read_error(&self, kind: io::ErrorKind) -> DeviceError {
        DeviceError::Io {
            path: self.identity.path.clone(),
            source: io::Error::new(kind, "scripted read failure"),
        }
    }

    fn lost(&self) -> DeviceError {
        DeviceError::Io {
            path: self.identity.path.clone(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"),
        }
    }
}

impl InputDevice for ScriptedDevice {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn grab(&mut self) -> DeviceResult<()> {
        if self.counters.fail_grab.load(Ordering::SeqCst) {
            return Err(DeviceError::Io {
                path: self.identity.path.clone(),
                source: io::Error::other("device is grabbed elsewhere"),
            });
        }
        self.counters.grabs.fetch_add(1, Ordering::SeqCst);
        self.counters.grabbed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn ungrab(&mut self) -> DeviceResult<()> {
        self.counters.ungrabs.fetch_add(1, Ordering::SeqCst);
        self.counters.grabbed.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn fetch_events(&mut self, timeout: Duration) -> DeviceResult<Vec<RawEvent>> {
        if let Some(kind) = self.pending_error.take() {
            return Err(self.read_error(kind));
        }

        let mut events = match self.receiver.recv_timeout(timeout) {
            Ok(Scripted::Event(event)) => vec![event],
            Ok(Scripted::Fail(kind)) => return Err(self.read_error(kind)),
            Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => return Err(self.lost()),
        };

        // Drain whatever else is queued; an error ends the batch and is
        // reported on the next call
        loop {
            match self.receiver.try_recv() {
                Ok(Scripted::Event(event)) => events.push(event),
                Ok(Scripted::Fail(kind)) => {
                    self.pending_error = Some(kind);
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(events)
    }
}

enum Entry {
    Scripted {
        name: String,
        has_keys: bool,
        device: Mutex<Option<ScriptedDevice>>,
    },
    Failing {
        name: String,
        kind: io::ErrorKind,
    },
}

/// Device provider backed by scripted devices.
///
/// Each scripted device can be opened once.
#[derive(Default)]
pub struct MemoryProvider {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device and return the script that feeds it
    pub fn add_device(&self, path: &str, name: &str, has_keys: bool) -> DeviceScript {
        let (device, script) = ScriptedDevice::new(path, name);
        self.entries.lock().insert(
            path.to_string(),
            Entry::Scripted {
                name: name.to_string(),
                has_keys,
                device: Mutex::new(Some(device)),
            },
        );
        script
    }

    /// Register a device that fails to open with `kind`
    pub fn add_failing(&self, path: &str, name: &str, kind: io::ErrorKind) {
        self.entries.lock().insert(
            path.to_string(),
            Entry::Failing {
                name: name.to_string(),
                kind,
            },
        );
    }
}

impl DeviceProvider for MemoryProvider {
    fn open(&self, path: &str) -> DeviceResult<Box<dyn InputDevice>> {
        let entries = self.entries.lock();
        match entries.get(path) {
            None => Err(DeviceError::NotFound(path.to_string())),
            Some(Entry::Failing { kind, .. }) => {
                Err(DeviceError::from_io(path, io::Error::from(*kind)))
            }
            Some(Entry::Scripted { device, .. }) => match device.lock().take() {
                Some(device) => Ok(Box::new(device)),
                None => Err(DeviceError::Io {
                    path: path.to_string(),
                    source: io::Error::other("device already open"),
                }),
            },
        }
    }

    fn enumerate(&self) -> DeviceResult<Vec<DeviceDescriptor>> {
        let entries = self.entries.lock();
        let mut descriptors = Vec::new();
        for (path, entry) in entries.iter() {
            match entry {
                Entry::Scripted { name, has_keys, .. } => descriptors.push(DeviceDescriptor {
                    path: path.clone(),
                    name: name.clone(),
                    has_keys: *has_keys,
                }),
                Entry::Failing { name, kind } => {
                    log::warn!(
                        "Skipping unreadable device: {} ({}): {}",
                        path,
                        name,
                        io::Error::from(*kind)
                    );
                }
            }
        }
        Ok(descriptors)
    }
}
