//! Core types for lap capture.
//!
//! ## Architecture
//!
//! - [`StaticInfo`], [`PhysicsInfo`] and [`GraphicsInfo`] are owned copies of the
//!   simulator's shared-memory pages, produced by a [`TelemetrySource`](crate::TelemetrySource)
//! - [`LapSummary`] is one report from the delayed broadcast channel
//! - [`Frame`] is the immutable per-tick snapshot built from physics + graphics
//! - [`Lap`] is an append-only run of frames plus metadata, and the unit that gets persisted
//! - [`PollRate`] bounds the capture loop's sampling interval
//!
//! [`Frame`] and [`Lap`] are protobuf messages (via `prost`) so staged files stay
//! readable by the uploader and by older builds.
//!
//! ## Usage Example
//!
//! ```rust
//! use lapcapture::types::{Frame, Lap, LapValidity};
//!
//! let mut lap = Lap::seeded(None, None, None);
//! lap.frames.push(Frame::at_position(0.01, LapValidity::Valid));
//! lap.frames.push(Frame::at_position(0.98, LapValidity::Valid));
//!
//! assert!(lap.spans(0.05, 0.95));
//! ```

mod frame;
mod lap;
mod poll_rate;
mod summary;
mod views;

pub use frame::{Frame, LapValidity};
pub use lap::Lap;
pub use poll_rate::PollRate;
pub use summary::LapSummary;
pub use views::{GraphicsInfo, PhysicsInfo, SimStatus, StaticInfo, wide_to_string};
