//! Mock device source for unit and integration testing.
//!
//! A [`MockDeviceFactory`] stands in for the evdev backend: tests register
//! device paths up front, the controller opens them like real hardware, and
//! the test then injects events through a [`MockDeviceHandle`]. Dropping or
//! disconnecting the handle closes the channel, which the source reports as
//! a read error – the same thing a vanishing USB keyboard looks like.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use latcher_core::{KeyCode, KeyInput, KeyValue};

use super::{DeviceSource, DeviceSourceFactory, SourceError, SourceEvent};

/// Shared record of what the worker did with a mock device.
#[derive(Debug, Default)]
pub struct DeviceLog {
    inner: Mutex<DeviceLogInner>,
}

#[derive(Debug, Default)]
struct DeviceLogInner {
    grab_attempts: u32,
    grabbed: bool,
    ungrabbed: bool,
}

impl DeviceLog {
    pub fn grab_attempts(&self) -> u32 {
        self.inner.lock().expect("lock poisoned").grab_attempts
    }

    pub fn is_grabbed(&self) -> bool {
        self.inner.lock().expect("lock poisoned").grabbed
    }

    pub fn was_ungrabbed(&self) -> bool {
        self.inner.lock().expect("lock poisoned").ungrabbed
    }
}

/// Test-side handle for feeding events into an opened mock device.
pub struct MockDeviceHandle {
    tx: Sender<SourceEvent>,
    log: Arc<DeviceLog>,
}

impl MockDeviceHandle {
    /// Injects an event, as if the hardware produced it.
    pub fn inject(&self, event: SourceEvent) {
        // A dropped source (worker already exited) is fine in tests.
        let _ = self.tx.send(event);
    }

    pub fn inject_key(&self, code: KeyCode, value: KeyValue) {
        self.inject(SourceEvent::Key(KeyInput::new(code, value)));
    }

    /// Closes the event channel: the source's next read fails like a
    /// disappeared device.
    pub fn disconnect(self) {}

    pub fn log(&self) -> Arc<DeviceLog> {
        Arc::clone(&self.log)
    }
}

/// A channel-fed [`DeviceSource`].
pub struct MockDeviceSource {
    name: String,
    path: PathBuf,
    rx: Receiver<SourceEvent>,
    fail_grab: bool,
    log: Arc<DeviceLog>,
}

impl DeviceSource for MockDeviceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        self.rx.recv().map_err(|_| {
            SourceError::Read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "mock device disconnected",
            ))
        })
    }

    fn grab(&mut self) -> Result<(), SourceError> {
        let mut log = self.log.inner.lock().expect("lock poisoned");
        log.grab_attempts += 1;
        if self.fail_grab {
            return Err(SourceError::Grab(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "mock grab refused",
            )));
        }
        log.grabbed = true;
        Ok(())
    }

    fn ungrab(&mut self) -> Result<(), SourceError> {
        let mut log = self.log.inner.lock().expect("lock poisoned");
        log.grabbed = false;
        log.ungrabbed = true;
        Ok(())
    }
}

#[derive(Default)]
struct Registration {
    name: String,
    fail_grab: bool,
    /// Handle for the most recently opened source of this path.
    latest: Option<MockDeviceHandle>,
}

/// Factory handing out [`MockDeviceSource`]s for registered paths.
#[derive(Default)]
pub struct MockDeviceFactory {
    registrations: Mutex<HashMap<PathBuf, Registration>>,
}

impl MockDeviceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device path so `open` succeeds for it.
    pub fn register(&self, path: impl Into<PathBuf>, name: &str) {
        self.register_inner(path.into(), name, false);
    }

    /// Registers a device whose exclusive grab will be refused.
    pub fn register_failing_grab(&self, path: impl Into<PathBuf>, name: &str) {
        self.register_inner(path.into(), name, true);
    }

    fn register_inner(&self, path: PathBuf, name: &str, fail_grab: bool) {
        self.registrations.lock().expect("lock poisoned").insert(
            path,
            Registration {
                name: name.to_string(),
                fail_grab,
                latest: None,
            },
        );
    }

    /// Takes the inject handle for the most recently opened source of `path`.
    pub fn handle(&self, path: impl AsRef<Path>) -> Option<MockDeviceHandle> {
        self.registrations
            .lock()
            .expect("lock poisoned")
            .get_mut(path.as_ref())
            .and_then(|reg| reg.latest.take())
    }

    /// Drops every retained inject handle, closing all open sources. Workers
    /// blocked in a read observe this as a device disappearance.
    pub fn disconnect_all(&self) {
        for reg in self
            .registrations
            .lock()
            .expect("lock poisoned")
            .values_mut()
        {
            reg.latest = None;
        }
    }
}

impl DeviceSourceFactory for MockDeviceFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn DeviceSource>, SourceError> {
        let mut registrations = self.registrations.lock().expect("lock poisoned");
        let reg = registrations
            .get_mut(path)
            .ok_or_else(|| SourceError::Open {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such mock device"),
            })?;

        let (tx, rx) = mpsc::channel();
        let log = Arc::new(DeviceLog::default());
        reg.latest = Some(MockDeviceHandle {
            tx,
            log: Arc::clone(&log),
        });
        Ok(Box::new(MockDeviceSource {
            name: reg.name.clone(),
            path: path.to_path_buf(),
            rx,
            fail_grab: reg.fail_grab,
            log,
        }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
