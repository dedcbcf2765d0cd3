//! State change notification.
//!
//! Snapshots are delivered synchronously from whichever worker thread
//! produced the change, so a [`StateObserver`] must be safe to call from an
//! arbitrary thread. Presentation layers with thread-affinity requirements
//! use [`ChannelObserver`], which turns the callback into a queue they drain
//! on their own scheduling model.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use latcher_core::{ControllerState, LatchEngine};

/// Receives a fresh snapshot after every state-affecting event.
pub trait StateObserver: Send + Sync {
    fn state_changed(&self, state: ControllerState);
}

/// A [`StateObserver`] that pushes snapshots into an mpsc channel.
///
/// Delivery to a dropped receiver is silently discarded: the engine never
/// blocks or fails because nobody is watching.
pub struct ChannelObserver {
    tx: Sender<ControllerState>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<ControllerState>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl StateObserver for ChannelObserver {
    fn state_changed(&self, state: ControllerState) {
        let _ = self.tx.send(state);
    }
}

/// Assembles [`ControllerState`] snapshots from the engine plus the
/// controller-level counters, and hands them to the observer.
///
/// Shared between the controller and every worker; the counters are atomics
/// so snapshot assembly only needs the pipeline lock for the engine part.
pub struct StatePublisher {
    observer: Arc<dyn StateObserver>,
    device_count: AtomicUsize,
    running: AtomicBool,
}

impl StatePublisher {
    pub fn new(observer: Arc<dyn StateObserver>) -> Self {
        Self {
            observer,
            device_count: AtomicUsize::new(0),
            running: AtomicBool::new(false),
        }
    }

    pub fn set_device_count(&self, count: usize) {
        self.device_count.store(count, Ordering::SeqCst);
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Builds a snapshot of the current state. Callers hold the pipeline
    /// lock for the engine borrow; delivery should happen after release.
    pub fn snapshot(&self, engine: &LatchEngine) -> ControllerState {
        ControllerState {
            latched_keys: engine.latched_keys(),
            trigger_code: engine.trigger_code(),
            trigger_held: engine.trigger_held(),
            device_count: self.device_count.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
        }
    }

    pub fn publish(&self, state: ControllerState) {
        self.observer.state_changed(state);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
