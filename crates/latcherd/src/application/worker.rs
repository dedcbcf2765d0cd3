//! Per-device read-and-forward worker.
//!
//! One [`DeviceWorker`] runs on a dedicated thread per registered physical
//! device. The loop blocks on the device read; each event is decided and
//! applied to the sink under the shared [`Pipeline`] lock, so "decide +
//! write + sync" is one atomic write-group even with several devices feeding
//! the same sink.
//!
//! Failure scope is per-device: a read error (device unplugged) or a sink
//! write error terminates this worker only, and cleanup (best-effort ungrab,
//! handle drop) always runs on the way out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use latcher_core::{Decision, KeyInput, LatchEngine, RawEventRecord, SinkAction, EV_KEY};
use tracing::{debug, error, info, warn};

use crate::application::observer::StatePublisher;
use crate::infrastructure::device::{DeviceSource, SourceEvent};
use crate::infrastructure::sink::{OutputSink, SinkError};

/// The shared decide-and-write state: the latch engine plus the sink it
/// drives. A single mutex around both is the serialization discipline for
/// every event, key or not.
pub struct Pipeline {
    pub engine: LatchEngine,
    pub sink: Box<dyn OutputSink>,
}

impl Pipeline {
    pub fn new(sink: Box<dyn OutputSink>) -> Self {
        Self {
            engine: LatchEngine::new(),
            sink,
        }
    }

    /// Applies a decision's actions as one write-group: the writes in order,
    /// then exactly one report boundary. A decision with no actions (a
    /// swallow) touches the sink not at all.
    ///
    /// `raw` is the verbatim event for `ForwardRaw`; release paths never
    /// forward, so they pass `None`.
    pub fn apply(
        &mut self,
        decision: &Decision,
        raw: Option<&RawEventRecord>,
    ) -> Result<(), SinkError> {
        if decision.actions.is_empty() {
            return Ok(());
        }
        for action in &decision.actions {
            match action {
                SinkAction::ForwardRaw => {
                    if let Some(raw) = raw {
                        self.sink.forward(raw)?;
                    }
                }
                SinkAction::EmitKey { code, value } => {
                    self.sink.write_key(*code, *value)?;
                }
            }
        }
        self.sink.sync()
    }
}

/// Reads one physical device and drives the shared pipeline.
pub struct DeviceWorker {
    source: Box<dyn DeviceSource>,
    pipeline: Arc<Mutex<Pipeline>>,
    publisher: Arc<StatePublisher>,
    running: Arc<AtomicBool>,
}

impl DeviceWorker {
    pub fn new(
        source: Box<dyn DeviceSource>,
        pipeline: Arc<Mutex<Pipeline>>,
        publisher: Arc<StatePublisher>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            pipeline,
            publisher,
            running,
        }
    }

    /// Runs the blocking read loop until stop, read error, or sink failure.
    pub fn run(mut self) {
        let device = self.source.name().to_string();
        info!(device, path = %self.source.path().display(), "device worker started");

        // Best effort: an ungrabbed device is still monitored, other
        // consumers just keep seeing its raw events too.
        if let Err(error) = self.source.grab() {
            warn!(device, %error, "exclusive grab failed, continuing ungrabbed");
        }

        self.read_loop(&device);

        // Cleanup always runs: normal stop, read error, or disappearance.
        if let Err(error) = self.source.ungrab() {
            debug!(device, %error, "ungrab on exit failed");
        }
        info!(device, "device worker stopped");
    }

    fn read_loop(&mut self, device: &str) {
        loop {
            let event = match self.source.next_event() {
                Ok(event) => event,
                Err(error) => {
                    if self.running.load(Ordering::SeqCst) {
                        error!(device, %error, "device read failed, stopping this worker");
                    } else {
                        debug!(device, "device closed during shutdown");
                    }
                    return;
                }
            };

            // Re-check promptly after every read: the event that unblocked a
            // stopped worker is discarded.
            if !self.running.load(Ordering::SeqCst) {
                return;
            }

            let result = match event {
                SourceEvent::Other(raw) => self.forward_verbatim(&raw),
                SourceEvent::Key(input) => self.handle_key(input),
            };
            if let Err(error) = result {
                error!(device, %error, "sink write failed, stopping this worker");
                return;
            }
        }
    }

    /// Non-key events (pointer motion, wheel, ...) pass through untouched,
    /// on the same lock discipline as key handling for sink-write safety.
    fn forward_verbatim(&self, raw: &RawEventRecord) -> Result<(), SinkError> {
        let mut pipeline = self.pipeline.lock().expect("pipeline lock poisoned");
        pipeline.sink.forward(raw)?;
        pipeline.sink.sync()
    }

    fn handle_key(&self, input: KeyInput) -> Result<(), SinkError> {
        let raw = RawEventRecord::new(EV_KEY, input.code, input.value.as_raw());
        let snapshot = {
            let mut pipeline = self.pipeline.lock().expect("pipeline lock poisoned");
            let decision = pipeline.engine.apply_key_event(input);
            pipeline.apply(&decision, Some(&raw))?;
            decision
                .state_changed
                .then(|| self.publisher.snapshot(&pipeline.engine))
        };
        // Deliver outside the lock; the observer runs arbitrary code.
        if let Some(snapshot) = snapshot {
            self.publisher.publish(snapshot);
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
