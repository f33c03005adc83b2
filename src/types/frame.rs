//! Per-tick frame snapshot

/// Lap validity as reported by the simulator for the current tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum LapValidity {
    /// Source did not report a recognised value
    Unknown = 0,
    /// Lap has been invalidated (track limits, cuts, ...)
    Invalid = 1,
    /// Lap still counts
    Valid = 2,
}

impl LapValidity {
    /// Map the simulator's raw `isValidLap` flag (1 = valid, 0 = invalid).
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => LapValidity::Valid,
            0 => LapValidity::Invalid,
            _ => LapValidity::Unknown,
        }
    }
}

/// Immutable snapshot of one telemetry tick.
///
/// Frames are appended to exactly one [`Lap`](super::Lap) and never modified
/// afterwards. Field tags are part of the staged file format and must not change.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Frame {
    #[prost(int32, tag = "1")]
    pub graphics_packet: i32,

    #[prost(int32, tag = "2")]
    pub physics_packet: i32,

    #[prost(enumeration = "LapValidity", tag = "3")]
    pub validity: i32,

    #[prost(int32, tag = "4")]
    pub penalty: i32,

    /// Throttle input, 0.0 to 1.0
    #[prost(float, tag = "5")]
    pub gas: f32,

    /// Brake input, 0.0 to 1.0
    #[prost(float, tag = "6")]
    pub brake: f32,

    #[prost(int32, tag = "7")]
    pub gear: i32,

    #[prost(int32, tag = "8")]
    pub rpm: i32,

    /// Steering angle, -1.0 to 1.0
    #[prost(float, tag = "9")]
    pub steer_angle: f32,

    #[prost(float, tag = "10")]
    pub speed_kmh: f32,

    /// Elapsed time in the current lap (ms)
    #[prost(int32, tag = "11")]
    pub current_time_ms: i32,

    /// Position along the lap, wraps from ~1.0 back to 0.0 at the line
    #[prost(float, tag = "12")]
    pub normalized_position: f32,

    #[prost(float, tag = "13")]
    pub car_x: f32,

    #[prost(float, tag = "14")]
    pub car_y: f32,

    #[prost(float, tag = "15")]
    pub car_z: f32,
}

impl Frame {
    /// Shorthand used when only position and validity matter.
    pub fn at_position(normalized_position: f32, validity: LapValidity) -> Self {
        Self { normalized_position, validity: validity as i32, ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_validity_maps_to_tri_state() {
        assert_eq!(LapValidity::from_raw(1), LapValidity::Valid);
        assert_eq!(LapValidity::from_raw(0), LapValidity::Invalid);
        assert_eq!(LapValidity::from_raw(-1), LapValidity::Unknown);
        assert_eq!(LapValidity::from_raw(7), LapValidity::Unknown);
    }

    #[test]
    fn validity_accessor_falls_back_to_unknown() {
        let mut frame = Frame::at_position(0.5, LapValidity::Valid);
        assert_eq!(frame.validity(), LapValidity::Valid);

        frame.validity = 42;
        assert_eq!(frame.validity(), LapValidity::Unknown);
    }
}
