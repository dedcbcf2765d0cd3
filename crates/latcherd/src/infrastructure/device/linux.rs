//! Linux evdev device source.
//!
//! Wraps one `/dev/input/event*` node. `fetch_events` hands back a batch of
//! events per blocking read; the batch is buffered here and handed out one
//! at a time so the worker loop can re-check its stop flag between events.
//!
//! Synchronization events are filtered out: the output sink emits its own
//! report boundaries, so forwarding upstream `SYN_REPORT`s would flush
//! half-built write-groups. Key events with a transition value outside the
//! 0/1/2 convention are passed through verbatim rather than interpreted.

#![cfg(target_os = "linux")]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use evdev::{Device, InputEvent, InputEventKind};
use latcher_core::{KeyInput, KeyValue, RawEventRecord};

use super::{DeviceSource, DeviceSourceFactory, SourceError, SourceEvent};

/// A physical input device read through evdev.
pub struct EvdevSource {
    device: Device,
    name: String,
    path: PathBuf,
    pending: VecDeque<SourceEvent>,
}

impl EvdevSource {
    /// Opens the device node at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Open`] when the node cannot be opened
    /// (missing node, insufficient permissions).
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let device = Device::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let name = device.name().unwrap_or("unnamed device").to_string();
        Ok(Self {
            device,
            name,
            path: path.to_path_buf(),
            pending: VecDeque::new(),
        })
    }

    fn convert(event: InputEvent) -> Option<SourceEvent> {
        match event.kind() {
            InputEventKind::Synchronization(_) => None,
            InputEventKind::Key(key) => Some(match KeyValue::from_raw(event.value()) {
                Some(value) => SourceEvent::Key(KeyInput::new(key.code(), value)),
                None => SourceEvent::Other(raw_record(&event)),
            }),
            _ => Some(SourceEvent::Other(raw_record(&event))),
        }
    }
}

fn raw_record(event: &InputEvent) -> RawEventRecord {
    RawEventRecord::new(event.event_type().0, event.code(), event.value())
}

impl DeviceSource for EvdevSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }
            let events = self.device.fetch_events().map_err(SourceError::Read)?;
            self.pending.extend(events.filter_map(Self::convert));
        }
    }

    fn grab(&mut self) -> Result<(), SourceError> {
        self.device.grab().map_err(SourceError::Grab)
    }

    fn ungrab(&mut self) -> Result<(), SourceError> {
        self.device.ungrab().map_err(SourceError::Grab)
    }
}

/// Opens [`EvdevSource`]s for the controller.
#[derive(Debug, Default)]
pub struct EvdevFactory;

impl DeviceSourceFactory for EvdevFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn DeviceSource>, SourceError> {
        Ok(Box::new(EvdevSource::open(path)?))
    }
}
