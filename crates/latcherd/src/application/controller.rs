//! The controller facade.
//!
//! [`LatchController`] owns the device registry, the shared pipeline
//! (engine + virtual output sink), and the worker threads. It serializes the
//! external control verbs – add/clear/start/stop/capture – and publishes a
//! state snapshot after each one, in addition to the snapshots workers
//! publish per key event.
//!
//! The sink is constructed by the caller and handed in at construction; it
//! lives for the controller's (and in practice the process's) lifetime.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::observer::{StateObserver, StatePublisher};
use crate::application::worker::{DeviceWorker, Pipeline};
use crate::infrastructure::device::{DeviceSourceFactory, SourceError};
use crate::infrastructure::sink::OutputSink;

/// Error type for the control verbs.
#[derive(Debug, Error)]
pub enum ControlError {
    /// `start()` was called with an empty device registry.
    #[error("no input device selected")]
    NoDeviceSelected,
    /// A device could not be opened when registering it.
    #[error(transparent)]
    DeviceOpen(#[from] SourceError),
}

/// A registered physical device: a human-readable name paired with the
/// host-specific path it was opened from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub path: PathBuf,
}

/// The latching input controller.
pub struct LatchController {
    devices: Vec<DeviceDescriptor>,
    pipeline: Arc<Mutex<Pipeline>>,
    publisher: Arc<StatePublisher>,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    factory: Box<dyn DeviceSourceFactory>,
}

impl LatchController {
    /// Creates the controller around an already-created output sink.
    pub fn new(
        sink: Box<dyn OutputSink>,
        factory: Box<dyn DeviceSourceFactory>,
        observer: Arc<dyn StateObserver>,
    ) -> Self {
        Self {
            devices: Vec::new(),
            pipeline: Arc::new(Mutex::new(Pipeline::new(sink))),
            publisher: Arc::new(StatePublisher::new(observer)),
            running: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
            factory,
        }
    }

    /// Registered devices, in registration order.
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Opens and registers a physical device. Reading does not start until
    /// [`start`](Self::start); a device added while running is picked up by
    /// the next start.
    pub fn add_device(&mut self, path: &Path) -> Result<(), ControlError> {
        let probe = self.factory.open(path)?;
        let descriptor = DeviceDescriptor {
            name: probe.name().to_string(),
            path: path.to_path_buf(),
        };
        drop(probe);

        info!(device = %descriptor.name, path = %descriptor.path.display(), "device registered");
        self.devices.push(descriptor);
        self.publisher.set_device_count(self.devices.len());
        self.publish_snapshot();
        Ok(())
    }

    /// Stops the engine and empties the registry.
    pub fn clear_devices(&mut self) {
        self.stop();
        self.devices.clear();
        self.publisher.set_device_count(0);
        info!("device registry cleared");
        self.publish_snapshot();
    }

    /// Spawns one worker per registered device.
    ///
    /// A device that fails to open is logged and skipped – device-local
    /// failures never abort the siblings. Calling `start` while already
    /// running is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NoDeviceSelected`] when the registry is empty.
    pub fn start(&mut self) -> Result<(), ControlError> {
        if self.devices.is_empty() {
            return Err(ControlError::NoDeviceSelected);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("start requested while already running");
            return Ok(());
        }
        self.publisher.set_running(true);

        for (index, descriptor) in self.devices.iter().enumerate() {
            let source = match self.factory.open(&descriptor.path) {
                Ok(source) => source,
                Err(error) => {
                    warn!(device = %descriptor.name, %error, "device failed to open, skipping");
                    continue;
                }
            };
            let worker = DeviceWorker::new(
                source,
                Arc::clone(&self.pipeline),
                Arc::clone(&self.publisher),
                Arc::clone(&self.running),
            );
            match thread::Builder::new()
                .name(format!("latcher-worker-{index}"))
                .spawn(move || worker.run())
            {
                Ok(handle) => self.workers.push(handle),
                Err(error) => {
                    warn!(device = %descriptor.name, %error, "failed to spawn worker, skipping")
                }
            }
        }

        info!(workers = self.workers.len(), "input controller started");
        self.publish_snapshot();
        Ok(())
    }

    /// Stops the engine: raises the stop flag, releases every latched key so
    /// nothing is left asserted at the OS level, and waits for every worker
    /// to terminate before returning.
    ///
    /// Workers unblock at their next device event or at device closure, so
    /// termination is not instantaneous.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.publisher.set_running(false);

        self.release_latches();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("device worker panicked");
            }
        }
        // Events in flight between the release and worker exit can have
        // composed fresh latches; sweep those too before reporting stopped.
        self.release_latches();

        info!("input controller stopped");
        self.publish_snapshot();
    }

    /// Arms detect mode: the next key DOWN on any registered device becomes
    /// the new trigger. The pipeline mutex makes the cross-device race
    /// single-winner – the first worker to take the lock with a DOWN wins.
    pub fn request_trigger_capture(&self) {
        let mut pipeline = self.pipeline.lock().expect("pipeline lock poisoned");
        pipeline.engine.arm_trigger_capture();
        info!("trigger capture armed, next key press becomes the trigger");
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn release_latches(&self) {
        let mut pipeline = self.pipeline.lock().expect("pipeline lock poisoned");
        let decision = pipeline.engine.release_all();
        if let Err(error) = pipeline.apply(&decision, None) {
            error!(%error, "failed to release latched keys");
        }
    }

    fn publish_snapshot(&self) {
        let snapshot = {
            let pipeline = self.pipeline.lock().expect("pipeline lock poisoned");
            self.publisher.snapshot(&pipeline.engine)
        };
        self.publisher.publish(snapshot);
    }
}

impl Drop for LatchController {
    fn drop(&mut self) {
        // Guarantee no key is left asserted if the facade goes away without
        // an explicit stop.
        if self.running.load(Ordering::SeqCst) || !self.workers.is_empty() {
            self.stop();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
