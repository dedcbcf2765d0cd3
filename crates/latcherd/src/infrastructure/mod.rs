//! Infrastructure adapters: physical device input, virtual device output,
//! and configuration storage.
//!
//! The application layer depends only on the traits defined in these
//! modules; the evdev/uinput implementations are compiled on Linux and the
//! mock implementations carry the test suites everywhere.

pub mod device;
pub mod sink;
pub mod storage;
