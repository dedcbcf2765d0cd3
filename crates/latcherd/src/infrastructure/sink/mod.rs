//! Virtual output device.
//!
//! The single process-wide [`OutputSink`] is where every transformed event
//! ends up. The kernel batches writes until a report boundary is flushed:
//! every logical state change (one or more writes) must be followed by
//! exactly one [`OutputSink::sync`] before the next unrelated change, or
//! downstream consumers can observe merged state. The application layer
//! serializes all sink calls behind the pipeline lock to keep write-groups
//! atomic across worker threads.

use std::io;

use latcher_core::{KeyCode, KeyValue, RawEventRecord};

pub mod mock;

#[cfg(target_os = "linux")]
pub mod uinput;

/// Error type for virtual output device operations.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The virtual device node could not be registered (permissions, uinput
    /// driver absent). Fatal at startup.
    #[error("failed to create virtual output device: {0}")]
    Create(#[source] io::Error),
    /// A write failed (device closed unexpectedly). Fatal to the worker that
    /// issued it.
    #[error("write to virtual output device failed: {0}")]
    Write(#[source] io::Error),
}

/// The process-wide virtual output device.
pub trait OutputSink: Send {
    /// Forwards an event unchanged.
    fn forward(&mut self, event: &RawEventRecord) -> Result<(), SinkError>;

    /// Synthesizes a discrete key transition. The engine only ever
    /// synthesizes DOWN and UP; HELD is never written here.
    fn write_key(&mut self, code: KeyCode, value: KeyValue) -> Result<(), SinkError>;

    /// Flushes a report boundary, making the writes since the previous
    /// boundary visible as one atomic input update.
    fn sync(&mut self) -> Result<(), SinkError>;
}
