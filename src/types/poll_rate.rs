//! Poll rate control for the frame capture loop

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interval between telemetry samples.
///
/// Always within [`PollRate::MIN_MS`]..=[`PollRate::MAX_MS`] and a multiple of
/// [`PollRate::STEP_MS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct PollRate(u64);

impl PollRate {
    pub const MIN_MS: u64 = 10;
    pub const MAX_MS: u64 = 100;
    pub const STEP_MS: u64 = 10;

    /// Round to the nearest step and clamp into range
    pub fn from_millis(ms: u64) -> Self {
        let rounded = ms.saturating_add(Self::STEP_MS / 2) / Self::STEP_MS * Self::STEP_MS;
        Self(rounded.clamp(Self::MIN_MS, Self::MAX_MS))
    }

    pub fn millis(self) -> u64 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Samples per second at this rate
    pub fn hz(self) -> f64 {
        1000.0 / self.0 as f64
    }
}

impl Default for PollRate {
    fn default() -> Self {
        Self(Self::MIN_MS)
    }
}

impl From<u64> for PollRate {
    fn from(ms: u64) -> Self {
        Self::from_millis(ms)
    }
}

impl From<PollRate> for u64 {
    fn from(rate: PollRate) -> Self {
        rate.0
    }
}
