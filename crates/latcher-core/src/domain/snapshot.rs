//! Immutable controller state snapshot.
//!
//! A [`ControllerState`] is published to the observer after every
//! state-affecting event. It is a plain value type: once handed out it is
//! never mutated, so observers on any thread may hold it as long as they
//! like. Serde derives let presentation layers ship it across whatever
//! boundary they live behind.

use serde::{Deserialize, Serialize};

use crate::domain::event::KeyCode;

/// Snapshot of the controller's observable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    /// Currently latched codes, ascending.
    pub latched_keys: Vec<KeyCode>,
    /// The current trigger binding, if one has been captured.
    pub trigger_code: Option<KeyCode>,
    /// Whether the trigger is physically held right now.
    pub trigger_held: bool,
    /// Number of registered physical devices.
    pub device_count: usize,
    /// Whether device workers are running.
    pub running: bool,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
