//! Lap record

use super::{Frame, GraphicsInfo, LapValidity, PhysicsInfo, StaticInfo};

/// Ordered run of frames between two lap boundaries, plus the session metadata
/// captured when the lap started.
///
/// `lap_time_ms` and `timestamp` are filled in after the lap closes. Field tags are
/// part of the staged file format and must not change.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Lap {
    #[prost(string, tag = "1")]
    pub sm_version: String,

    #[prost(string, tag = "2")]
    pub ac_version: String,

    #[prost(string, tag = "3")]
    pub car_model: String,

    #[prost(string, tag = "4")]
    pub track: String,

    #[prost(string, tag = "5")]
    pub player_name: String,

    #[prost(string, tag = "6")]
    pub player_nick: String,

    #[prost(string, tag = "7")]
    pub player_surname: String,

    #[prost(float, tag = "8")]
    pub air_temp: f32,

    #[prost(float, tag = "9")]
    pub road_temp: f32,

    #[prost(int32, tag = "10")]
    pub session_type: i32,

    #[prost(int32, tag = "11")]
    pub rain_tyres: i32,

    /// Validity reported when the lap started
    #[prost(enumeration = "LapValidity", tag = "12")]
    pub validity_at_start: i32,

    #[prost(int32, tag = "13")]
    pub track_grip_status: i32,

    #[prost(int32, tag = "14")]
    pub rain_intensity: i32,

    /// Final lap time, set once the broadcast channel confirms it
    #[prost(int32, tag = "15")]
    pub lap_time_ms: i32,

    #[prost(message, repeated, tag = "16")]
    pub frames: Vec<Frame>,

    /// Completed-lap counter at lap start. Informational only.
    #[prost(int32, tag = "17")]
    pub lap_number: i32,

    /// Unix seconds when the lap boundary was crossed
    #[prost(uint64, tag = "18")]
    pub timestamp: u64,

    /// Player car id, matched against broadcast summaries
    #[prost(int32, tag = "19")]
    pub car_index: i32,
}

impl Lap {
    /// Start an empty lap from whatever views the source currently has.
    ///
    /// Missing views leave their fields at default values.
    pub fn seeded(
        static_info: Option<&StaticInfo>,
        physics: Option<&PhysicsInfo>,
        graphics: Option<&GraphicsInfo>,
    ) -> Self {
        let mut lap = Lap::default();

        if let Some(info) = static_info {
            lap.sm_version = info.sm_version.clone();
            lap.ac_version = info.ac_version.clone();
            lap.car_model = info.car_model.clone();
            lap.track = info.track.clone();
            lap.player_name = info.player_name.clone();
            lap.player_nick = info.player_nick.clone();
            lap.player_surname = info.player_surname.clone();
        }

        if let Some(physics) = physics {
            lap.air_temp = physics.air_temp;
            lap.road_temp = physics.road_temp;
        }

        if let Some(graphics) = graphics {
            lap.session_type = graphics.session_type;
            lap.rain_tyres = graphics.rain_tyres;
            lap.set_validity_at_start(LapValidity::from_raw(graphics.is_valid_lap));
            lap.track_grip_status = graphics.track_grip_status;
            lap.rain_intensity = graphics.rain_intensity;
            lap.lap_number = graphics.completed_laps;
            lap.car_index = graphics.player_car_id;
        }

        lap
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn first_frame(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// True when the frames start before `start_below` and end after `end_above`.
    pub fn spans(&self, start_below: f32, end_above: f32) -> bool {
        match (self.first_frame(), self.last_frame()) {
            (Some(first), Some(last)) => {
                first.normalized_position < start_below && last.normalized_position > end_above
            }
            _ => false,
        }
    }
}
