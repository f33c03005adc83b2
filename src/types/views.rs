//! Snapshot views exposed by a telemetry source
//!
//! These mirror the three shared-memory pages of the simulator (static, physics,
//! graphics). Sources copy out of the mapped memory into these owned values so the
//! engine never holds a reference into memory another process writes.

use crate::{CaptureError, Result};

/// Simulator status code from the graphics page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimStatus {
    #[default]
    Off,
    Replay,
    /// Driving session in progress. The only status that starts capture.
    Live,
    Pause,
}

impl SimStatus {
    pub fn is_live(self) -> bool {
        self == SimStatus::Live
    }
}

impl TryFrom<i32> for SimStatus {
    type Error = CaptureError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(SimStatus::Off),
            1 => Ok(SimStatus::Replay),
            2 => Ok(SimStatus::Live),
            3 => Ok(SimStatus::Pause),
            other => Err(CaptureError::unsupported_value("status", other.into())),
        }
    }
}

/// Session metadata that does not change during a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticInfo {
    pub sm_version: String,
    pub ac_version: String,
    pub car_model: String,
    pub track: String,
    pub player_name: String,
    pub player_nick: String,
    pub player_surname: String,
}

/// Per-tick vehicle physics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicsInfo {
    pub packet_id: i32,
    pub gas: f32,
    pub brake: f32,
    pub steer_angle: f32,
    pub gear: i32,
    pub rpm: i32,
    pub speed_kmh: f32,
    pub air_temp: f32,
    pub road_temp: f32,
}

/// Per-tick session and timing state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphicsInfo {
    pub packet_id: i32,
    pub status: SimStatus,
    pub session_type: i32,
    pub completed_laps: i32,
    pub current_time_ms: i32,
    /// Last completed lap time. `i32::MAX` when there is none.
    pub last_time_ms: i32,
    pub normalized_position: f32,
    pub is_valid_lap: i32,
    pub penalty: i32,
    pub rain_tyres: i32,
    pub track_grip_status: i32,
    pub rain_intensity: i32,
    /// Car ids by slot. Slot order changes as players join and leave.
    pub car_ids: Vec<i32>,
    /// World coordinates by slot, parallel to `car_ids`.
    pub car_coordinates: Vec<[f32; 3]>,
    pub player_car_id: i32,
}

/// Decode a NUL-padded UTF-16 buffer from shared memory.
///
/// Stops at the first NUL and trims surrounding whitespace. Unpaired surrogates
/// are replaced rather than rejected.
pub fn wide_to_string(chars: &[u16]) -> String {
    let end = chars.iter().position(|&c| c == 0).unwrap_or(chars.len());
    String::from_utf16_lossy(&chars[..end]).trim().to_string()
}
