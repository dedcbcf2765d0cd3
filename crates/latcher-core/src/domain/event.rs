//! Key transition model shared between the engine and the device/sink seams.
//!
//! The kernel input layer reports key transitions as small integers: 0 for a
//! release, 1 for a press, 2 for an auto-repeat while held. [`KeyValue`] gives
//! those a typed form; [`RawEventRecord`] carries any event verbatim for
//! passthrough without tying the domain to a particular device API.

use serde::{Deserialize, Serialize};

/// Numeric key/button code as reported by the input subsystem.
pub type KeyCode = u16;

/// Kernel event class for key transitions (`EV_KEY`).
pub const EV_KEY: u16 = 0x01;

/// A key transition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyValue {
    /// The key was released.
    Up,
    /// The key was pressed.
    Down,
    /// Auto-repeat while the key is held. Never synthesized by the engine.
    Held,
}

impl KeyValue {
    /// Converts a raw kernel transition value. Returns `None` for values
    /// outside the 0/1/2 convention so callers can fall back to verbatim
    /// passthrough.
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyValue::Up),
            1 => Some(KeyValue::Down),
            2 => Some(KeyValue::Held),
            _ => None,
        }
    }

    /// The raw kernel transition value.
    pub fn as_raw(self) -> i32 {
        match self {
            KeyValue::Up => 0,
            KeyValue::Down => 1,
            KeyValue::Held => 2,
        }
    }
}

/// A key transition read from a physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub code: KeyCode,
    pub value: KeyValue,
}

impl KeyInput {
    pub fn new(code: KeyCode, value: KeyValue) -> Self {
        Self { code, value }
    }
}

/// A raw input event carried verbatim for passthrough.
///
/// `event_type` is the kernel event class (key, relative axis, ...); the
/// engine never interprets it, it only decides whether the event is forwarded
/// unchanged or replaced by synthetic transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEventRecord {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEventRecord {
    pub fn new(event_type: u16, code: u16, value: i32) -> Self {
        Self {
            event_type,
            code,
            value,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
