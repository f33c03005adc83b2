//! Broadcast lap summary

/// Lap completion report from the simulator's broadcast channel.
///
/// The broadcast channel runs several seconds behind the shared-memory views and
/// carries reports for every car in the session, not just the player's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LapSummary {
    /// Car id the report belongs to
    pub car_index: i32,
    /// Laps completed by that car when the report was sent
    pub completed_laps: i32,
    pub last_lap_time_ms: i32,
    /// The simulator's own verdict on whether the lap counts towards best
    pub valid_for_best: bool,
}

impl LapSummary {
    /// Check this report describes the lap the player just finished.
    ///
    /// All three must agree. The car guards against other drivers' reports, the lap
    /// count against reports more than one lap stale, and the time against reports
    /// for the previous lap arriving late.
    pub fn corroborates(&self, car_index: i32, completed_laps: i32, last_lap_time_ms: i32) -> bool {
        self.car_index == car_index
            && self.completed_laps == completed_laps
            && self.last_lap_time_ms == last_lap_time_ms
    }
}
