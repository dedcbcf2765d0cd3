//! Application layer: the controller facade, the per-device workers, and the
//! observer seam they publish state through.
//!
//! Everything here depends only on the infrastructure traits
//! ([`crate::infrastructure::device::DeviceSource`],
//! [`crate::infrastructure::sink::OutputSink`]) and the domain engine, so the
//! whole layer is exercised in tests with mock infrastructure.

pub mod controller;
pub mod observer;
pub mod worker;
