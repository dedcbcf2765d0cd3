//! # latcher-core
//!
//! Latching engine and domain types for the Latcher input daemon.
//!
//! Latcher turns a designated *trigger* key into a gate for composing sticky
//! keys: while the trigger is held, any key pressed becomes latched – it stays
//! virtually asserted after its physical release until it is explicitly
//! released again. A trigger tap with no new latch releases everything.
//!
//! This crate is the pure core: the state machine that decides, for every key
//! transition read from a physical device, what the virtual output device
//! should emit. It has zero dependencies on OS APIs, device nodes, or threads;
//! the daemon crate (`latcherd`) supplies those around it.
//!
//! - **`domain::event`** – the key transition model shared between the engine
//!   and the device/sink boundaries.
//! - **`domain::latch`** – the latching state machine itself.
//! - **`domain::snapshot`** – the immutable state snapshot handed to
//!   observers after every state-affecting event.

pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `latcher_core::LatchEngine` instead of `latcher_core::domain::latch::LatchEngine`.
pub use domain::event::{KeyCode, KeyInput, KeyValue, RawEventRecord, EV_KEY};
pub use domain::latch::{Decision, LatchEngine, SinkAction};
pub use domain::snapshot::ControllerState;
