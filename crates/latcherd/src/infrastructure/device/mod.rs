//! Physical input device access.
//!
//! A [`DeviceSource`] wraps one open device node and hands out events one at
//! a time from a blocking read. The production implementation
//! ([`linux::EvdevSource`]) reads `/dev/input/event*` nodes through the
//! `evdev` crate; tests use [`mock::MockDeviceSource`], which is fed from a
//! channel so a test can script a device or simulate it disappearing.
//!
//! A [`DeviceSourceFactory`] is the seam the controller uses to open
//! devices, so the whole worker lifecycle is exercisable without hardware.

use std::io;
use std::path::{Path, PathBuf};

use latcher_core::{KeyInput, RawEventRecord};

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;

/// A single event read from a physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// A key transition, to be run through the latching engine.
    Key(KeyInput),
    /// Anything else (pointer motion, wheel, ...), forwarded verbatim.
    Other(RawEventRecord),
}

/// Error type for device source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to open input device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Exclusive grab failed. Non-fatal: the device is still monitored, but
    /// other consumers may also see its raw events.
    #[error("failed to grab input device: {0}")]
    Grab(#[source] io::Error),
    /// The device disappeared or errored mid-read. Terminal for the worker
    /// that owns this device only.
    #[error("read from input device failed: {0}")]
    Read(#[source] io::Error),
}

/// One open physical input device.
///
/// `next_event` blocks until a hardware event occurs or the device handle is
/// closed/invalidated; there is no timeout. Implementations are moved into
/// the worker thread that drives them.
pub trait DeviceSource: Send {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Host-specific device path.
    fn path(&self) -> &Path;

    /// Blocks until the next event arrives.
    fn next_event(&mut self) -> Result<SourceEvent, SourceError>;

    /// Claims the device exclusively so other consumers stop receiving its
    /// raw events.
    fn grab(&mut self) -> Result<(), SourceError>;

    /// Releases an exclusive claim. Safe to call when not grabbed.
    fn ungrab(&mut self) -> Result<(), SourceError>;
}

/// Opens [`DeviceSource`]s from paths.
pub trait DeviceSourceFactory: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn DeviceSource>, SourceError>;
}

impl<F: DeviceSourceFactory + ?Sized> DeviceSourceFactory for std::sync::Arc<F> {
    fn open(&self, path: &Path) -> Result<Box<dyn DeviceSource>, SourceError> {
        (**self).open(path)
    }
}
