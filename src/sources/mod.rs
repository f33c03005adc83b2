//! Telemetry source implementations
//!
//! The engine only depends on the [`TelemetrySource`](crate::TelemetrySource) trait.
//! Shared-memory and UDP bindings for a particular simulator live outside this crate
//! and plug in through the same trait.

pub mod memory;

pub use memory::MemorySource;
