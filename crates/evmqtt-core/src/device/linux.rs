// evmqtt Linux Input Devices
// evdev-backed devices under /dev/input

use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

use evdev::{Device, EventType};

use super::{DeviceDescriptor, DeviceError, DeviceIdentity, DeviceProvider, DeviceResult, InputDevice};
use crate::event::RawEvent;

const INPUT_DIR: &str = "/dev/input";

/// An opened `/dev/input/event*` node
pub struct EvdevDevice {
    device: Device,
    identity: DeviceIdentity,
    grabbed: bool,
}

impl EvdevDevice {
    pub fn open(path: &str) -> DeviceResult<Self> {
        let device = Device::open(path).map_err(|e| DeviceError::from_io(path, e))?;
        let name = device.name().unwrap_or("Unknown").to_string();
        Ok(Self {
            device,
            identity: DeviceIdentity::new(path, name),
            grabbed: false,
        })
    }

    pub fn has_keys(&self) -> bool {
        self.device.supported_events().contains(EventType::KEY)
    }

    /// Wait for the fd to become readable. Returns false on timeout or EINTR.
    fn wait_readable(&self, timeout: Duration) -> DeviceResult<bool> {
        let mut fds = [libc::pollfd {
            fd: self.device.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        }];
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

        // SAFETY: fds is a valid array of fds.len() pollfd entries
        let result = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };

        if result < 0 {
            let err = io::Error::last_os_error();
            // A delivered signal (e.g. Ctrl+C) is not a device fault
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(self.io_error(err));
        }
        if result == 0 {
            return Ok(false);
        }
        if fds[0].revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            return Err(self.io_error(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device disconnected",
            )));
        }
        Ok(fds[0].revents & libc::POLLIN != 0)
    }

    fn io_error(&self, err: io::Error) -> DeviceError {
        DeviceError::Io {
            path: self.identity.path.clone(),
            source: err,
        }
    }
}

impl InputDevice for EvdevDevice {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn grab(&mut self) -> DeviceResult<()> {
        // A previous instance may have crashed while holding the grab
        let _ = self.device.ungrab();
        self.device.grab().map_err(|e| self.io_error(e))?;
        self.grabbed = true;
        Ok(())
    }

    fn ungrab(&mut self) -> DeviceResult<()> {
        if !self.grabbed {
            return Ok(());
        }
        self.grabbed = false;
        self.device.ungrab().map_err(|e| self.io_error(e))
    }

    fn fetch_events(&mut self, timeout: Duration) -> DeviceResult<Vec<RawEvent>> {
        if !self.wait_readable(timeout)? {
            return Ok(Vec::new());
        }
        match self.device.fetch_events() {
            Ok(events) => Ok(events
                .map(|e| RawEvent::new(e.event_type().0, e.code(), e.value()))
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) => Err(DeviceError::Io {
                path: self.identity.path.clone(),
                source: e,
            }),
        }
    }
}

impl Drop for EvdevDevice {
    fn drop(&mut self) {
        // The device must never stay grabbed, or the keyboard stays dead
        if self.grabbed {
            let _ = self.device.ungrab();
        }
    }
}

/// Opens devices from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct EvdevProvider;

impl EvdevProvider {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceProvider for EvdevProvider {
    fn open(&self, path: &str) -> DeviceResult<Box<dyn InputDevice>> {
        Ok(Box::new(EvdevDevice::open(path)?))
    }

    fn enumerate(&self) -> DeviceResult<Vec<DeviceDescriptor>> {
        let entries = fs::read_dir(INPUT_DIR).map_err(|e| DeviceError::from_io(INPUT_DIR, e))?;

        let mut paths: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_event_node(path))
            .filter_map(|path| path.to_str().map(str::to_string))
            .collect();
        paths.sort();

        let mut descriptors = Vec::with_capacity(paths.len());
        for path in paths {
            match EvdevDevice::open(&path) {
                Ok(device) => descriptors.push(DeviceDescriptor {
                    has_keys: device.has_keys(),
                    name: device.identity.name.clone(),
                    path,
                }),
                Err(e) => log::warn!("Skipping unreadable device: {}", e),
            }
        }
        Ok(descriptors)
    }
}

fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("event"))
}
