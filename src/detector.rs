//! Lap boundary detection
//!
//! The detector splits the continuous frame stream into laps. A lap ends when the
//! normalized track position decreases between two consecutive frames (the car
//! crossed the line and wrapped from ~1.0 to ~0.0).
//!
//! A closed lap is only kept when the car really drove all of it:
//!
//! - the frame before the wrap still reported the lap as valid
//! - the first frame is below [`LAP_START_THRESHOLD`] (the lap started at the line,
//!   not mid-track after joining or leaving the pits)
//! - the last frame is above [`LAP_END_THRESHOLD`]
//!
//! Everything else (out laps, resets, teleports back to the pits) is discarded.
//! Either way a new lap starts immediately and the frame that triggered the wrap
//! becomes its first frame.

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

use crate::types::{Frame, Lap, LapValidity};

/// A candidate lap must start below this normalized position
pub const LAP_START_THRESHOLD: f32 = 0.05;

/// A candidate lap must end above this normalized position
pub const LAP_END_THRESHOLD: f32 = 0.95;

/// Why a closed lap was not kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The frame before the wrap did not report a valid lap
    NotValid(LapValidity),
    /// The first frame was past the start threshold
    LateStart,
    /// The last frame was short of the end threshold
    EarlyEnd,
}

/// Result of feeding a frame that crossed a lap boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary {
    /// The closed lap passed every check and is ready for confirmation
    Completed(Lap),
    /// The closed lap was dropped
    Discarded { reason: DiscardReason, frames: usize },
}

/// Splits frames into laps. Owns the single open lap of a capture session.
#[derive(Debug)]
pub struct LapDetector {
    open: Lap,
    previous: Option<Frame>,
}

impl LapDetector {
    /// Start detecting with `first_lap` as the open lap
    pub fn new(first_lap: Lap) -> Self {
        Self { open: first_lap, previous: None }
    }

    /// The lap currently being appended to
    pub fn open_lap(&self) -> &Lap {
        &self.open
    }

    /// The most recently pushed frame
    pub fn previous_frame(&self) -> Option<&Frame> {
        self.previous.as_ref()
    }

    /// Feed the next frame.
    ///
    /// `next_lap` is called only when a boundary is crossed, to seed the lap that
    /// replaces the closed one. The closed lap is returned by value and the detector
    /// keeps no reference to it.
    pub fn push(&mut self, frame: Frame, next_lap: impl FnOnce() -> Lap) -> Option<Boundary> {
        let boundary = match &self.previous {
            Some(previous)
                if !self.open.is_empty()
                    && frame.normalized_position - previous.normalized_position < 0.0 =>
            {
                let validity = previous.validity();
                let closed = std::mem::replace(&mut self.open, next_lap());
                Some(Self::judge(closed, validity))
            }
            _ => None,
        };

        trace!(position = frame.normalized_position, frames = self.open.len(), "Frame");

        self.previous = Some(frame.clone());
        self.open.frames.push(frame);

        boundary
    }

    fn judge(mut closed: Lap, validity: LapValidity) -> Boundary {
        let frames = closed.len();
        let reason = match (closed.first_frame(), closed.last_frame()) {
            _ if validity != LapValidity::Valid => Some(DiscardReason::NotValid(validity)),
            (Some(first), _) if first.normalized_position >= LAP_START_THRESHOLD => {
                Some(DiscardReason::LateStart)
            }
            (_, Some(last)) if last.normalized_position <= LAP_END_THRESHOLD => {
                Some(DiscardReason::EarlyEnd)
            }
            _ => None,
        };

        match reason {
            Some(reason) => {
                debug!(
                    ?reason,
                    frames,
                    first = closed.first_frame().map(|f| f.normalized_position),
                    track = %closed.track,
                    "Lap discarded"
                );
                Boundary::Discarded { reason, frames }
            }
            None => {
                closed.timestamp = unix_now();
                debug!(frames, track = %closed.track, timestamp = closed.timestamp, "Lap completed");
                Boundary::Completed(closed)
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
