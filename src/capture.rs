//! Frame capture loop
//!
//! While a session is online, a [`CaptureSession`] samples the source on every poll
//! tick. Each sample becomes a [`Frame`] that is fed to the session's
//! [`LapDetector`]. Completed laps are moved into their own confirmation task.

use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::confirm::LapConfirmation;
use crate::detector::{Boundary, LapDetector};
use crate::persist::LapSink;
use crate::source::TelemetrySource;
use crate::types::{Frame, GraphicsInfo, Lap, LapValidity, PhysicsInfo, PollRate};

/// Find the player's slot in the source's car table.
///
/// Slots shift as other players join and leave, so this is resolved again on every
/// tick. A player who disconnects between this lookup and the coordinate read can
/// still yield another car's coordinates for that one tick.
pub fn resolve_car_index(player_car_id: i32, car_ids: &[i32]) -> Option<usize> {
    car_ids.iter().position(|&id| id == player_car_id)
}

/// Build the frame for one tick from the physics and graphics pages
pub fn build_frame(physics: &PhysicsInfo, graphics: &GraphicsInfo) -> Frame {
    let [car_x, car_y, car_z] = resolve_car_index(graphics.player_car_id, &graphics.car_ids)
        .and_then(|slot| graphics.car_coordinates.get(slot).copied())
        .unwrap_or_default();

    Frame {
        graphics_packet: graphics.packet_id,
        physics_packet: physics.packet_id,
        validity: LapValidity::from_raw(graphics.is_valid_lap) as i32,
        penalty: graphics.penalty,
        gas: physics.gas,
        brake: physics.brake,
        gear: physics.gear,
        rpm: physics.rpm,
        steer_angle: physics.steer_angle,
        speed_kmh: physics.speed_kmh,
        current_time_ms: graphics.current_time_ms,
        normalized_position: graphics.normalized_position,
        car_x,
        car_y,
        car_z,
    }
}

/// Seed a new lap from the source's current views
pub fn seed_lap<S>(source: &S) -> Lap
where
    S: TelemetrySource + ?Sized,
{
    Lap::seeded(
        source.static_view().as_ref(),
        source.physics_view().as_ref(),
        source.graphics_view().as_ref(),
    )
}

/// Counters for one capture session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    /// Ticks with no physics or graphics page
    pub skipped_ticks: u64,
    /// Laps handed to confirmation
    pub laps_completed: u64,
    pub laps_discarded: u64,
}

/// State of one online session: the detector (open lap + previous frame) and the
/// handles shared with confirmation tasks.
///
/// Owned by exactly one capture task, so nothing here is shared mutably.
pub struct CaptureSession<S: ?Sized, K: ?Sized> {
    source: Arc<S>,
    sink: Arc<K>,
    confirmation: LapConfirmation,
    detector: LapDetector,
    stats: CaptureStats,
}

impl<S, K> CaptureSession<S, K>
where
    S: TelemetrySource + ?Sized,
    K: LapSink + ?Sized,
{
    /// Open a session, seeding the first lap from the source's current views
    pub fn new(source: Arc<S>, sink: Arc<K>, confirmation: LapConfirmation) -> Self {
        let detector = LapDetector::new(seed_lap(source.as_ref()));
        Self { source, sink, confirmation, detector, stats: CaptureStats::default() }
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn detector(&self) -> &LapDetector {
        &self.detector
    }

    /// Sample the source once.
    ///
    /// Returns `false` when the tick was skipped because a page was unavailable.
    /// Must be called from within a tokio runtime, as completed laps are confirmed on
    /// spawned tasks.
    pub fn tick(&mut self) -> bool {
        let (Some(physics), Some(graphics)) = (self.source.physics_view(), self.source.graphics_view())
        else {
            self.stats.skipped_ticks += 1;
            trace!("Telemetry page unavailable, skipping tick");
            return false;
        };

        let frame = build_frame(&physics, &graphics);
        self.stats.frames += 1;

        let source = &self.source;
        match self.detector.push(frame, || seed_lap(source.as_ref())) {
            Some(Boundary::Completed(lap)) => {
                self.stats.laps_completed += 1;
                debug!(frames = lap.len(), track = %lap.track, "Dispatching lap for confirmation");
                // Fire-and-forget: the task owns the lap and reports its own outcome
                drop(self.confirmation.spawn(Arc::clone(&self.source), lap, Arc::clone(&self.sink)));
            }
            Some(Boundary::Discarded { .. }) => self.stats.laps_discarded += 1,
            None => {}
        }
        true
    }

    /// Sample every `poll_rate` until `cancel` fires
    pub async fn run(mut self, poll_rate: PollRate, cancel: CancellationToken) -> CaptureStats {
        info!(poll_rate_ms = poll_rate.millis(), "Starting telemetry capture");

        let mut ticker = interval(poll_rate.as_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        info!(
            frames = self.stats.frames,
            skipped = self.stats.skipped_ticks,
            completed = self.stats.laps_completed,
            discarded = self.stats.laps_discarded,
            "Stopped telemetry capture"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::config::ConfirmationConfig;
    use crate::sources::MemorySource;
    use crate::types::{LapSummary, SimStatus, StaticInfo};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        laps: Mutex<Vec<Lap>>,
    }

    #[async_trait]
    impl LapSink for RecordingSink {
        async fn store(&self, lap: Lap) -> Result<PathBuf> {
            self.laps.lock().expect("sink lock").push(lap);
            Ok(PathBuf::from("mem"))
        }
    }

    fn graphics_at(position: f32, valid: bool) -> GraphicsInfo {
        GraphicsInfo {
            status: SimStatus::Live,
            normalized_position: position,
            is_valid_lap: valid as i32,
            completed_laps: 5,
            last_time_ms: 98_765,
            player_car_id: 1003,
            car_ids: vec![1001, 1002, 1003],
            car_coordinates: vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]],
            ..Default::default()
        }
    }

    fn live_source() -> Arc<MemorySource> {
        let source = Arc::new(MemorySource::new());
        source.publish_static(StaticInfo {
            track: "zandvoort".into(),
            car_model: "mclaren_720s_gt3".into(),
            ..Default::default()
        });
        source.publish_physics(PhysicsInfo { gear: 4, rpm: 7_200, ..Default::default() });
        source.publish_graphics(graphics_at(0.0, true));
        source
    }

    #[test]
    fn car_index_is_found_by_scan() {
        assert_eq!(resolve_car_index(1003, &[1001, 1002, 1003]), Some(2));
        assert_eq!(resolve_car_index(1001, &[1001, 1001]), Some(0));
        assert_eq!(resolve_car_index(42, &[1001, 1002]), None);
        assert_eq!(resolve_car_index(42, &[]), None);
    }

    #[test]
    fn frame_uses_players_slot() {
        let physics = PhysicsInfo { packet_id: 11, gas: 0.8, gear: 3, ..Default::default() };
        let graphics = graphics_at(0.42, true);

        let frame = build_frame(&physics, &graphics);

        assert_eq!((frame.car_x, frame.car_y, frame.car_z), (7.0, 8.0, 9.0));
        assert_eq!(frame.physics_packet, 11);
        assert_eq!(frame.gas, 0.8);
        assert_eq!(frame.normalized_position, 0.42);
        assert_eq!(frame.validity(), LapValidity::Valid);
    }

    #[test]
    fn unresolved_slot_leaves_coordinates_at_origin() {
        let mut graphics = graphics_at(0.1, false);
        graphics.player_car_id = 9999;
        let frame = build_frame(&PhysicsInfo::default(), &graphics);
        assert_eq!((frame.car_x, frame.car_y, frame.car_z), (0.0, 0.0, 0.0));
        assert_eq!(frame.validity(), LapValidity::Invalid);

        // Car id present but coordinate table is short
        graphics.player_car_id = 1003;
        graphics.car_coordinates.truncate(1);
        let frame = build_frame(&PhysicsInfo::default(), &graphics);
        assert_eq!(frame.car_x, 0.0);
    }

    #[tokio::test]
    async fn missing_pages_skip_the_tick() {
        let source = Arc::new(MemorySource::new());
        let sink = Arc::new(RecordingSink::default());
        let mut session = CaptureSession::new(Arc::clone(&source), sink, LapConfirmation::default());

        assert!(!session.tick());
        source.publish_graphics(graphics_at(0.0, true));
        assert!(!session.tick());
        source.publish_physics(PhysicsInfo::default());
        assert!(session.tick());

        let stats = session.stats();
        assert_eq!(stats.skipped_ticks, 2);
        assert_eq!(stats.frames, 1);
        assert_eq!(session.detector().open_lap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_lap_is_confirmed_and_stored() {
        let source = live_source();
        let sink = Arc::new(RecordingSink::default());
        let mut session =
            CaptureSession::new(Arc::clone(&source), Arc::clone(&sink), LapConfirmation::default());

        for position in [0.0, 0.3, 0.6, 0.97, 0.02] {
            source.publish_graphics(graphics_at(position, true));
            session.tick();
        }
        assert_eq!(session.stats().laps_completed, 1);
        // The wrapping frame belongs to the new lap
        assert_eq!(session.detector().open_lap().len(), 1);

        source.publish_summary(LapSummary {
            car_index: 1003,
            completed_laps: 5,
            last_lap_time_ms: 98_765,
            valid_for_best: true,
        });
        tokio::time::sleep(Duration::from_secs(6)).await;

        let stored = sink.laps.lock().expect("sink lock").clone();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].frames.len(), 4);
        assert_eq!(stored[0].lap_time_ms, 98_765);
        assert_eq!(stored[0].track, "zandvoort");
        assert_eq!(stored[0].car_index, 1003);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_lap_never_reaches_the_sink() {
        let source = live_source();
        let sink = Arc::new(RecordingSink::default());
        let confirmation = LapConfirmation::new(ConfirmationConfig {
            initial_delay_ms: 10,
            window_ms: 100,
            retry_interval_ms: 10,
        });
        let mut session = CaptureSession::new(Arc::clone(&source), Arc::clone(&sink), confirmation);
        source.publish_summary(LapSummary {
            car_index: 1003,
            completed_laps: 5,
            last_lap_time_ms: 98_765,
            valid_for_best: true,
        });

        for (position, valid) in [(0.0, true), (0.3, true), (0.6, true), (0.97, false), (0.02, true)] {
            source.publish_graphics(graphics_at(position, valid));
            session.tick();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(session.stats().laps_discarded, 1);
        assert_eq!(session.stats().laps_completed, 0);
        assert!(sink.laps.lock().expect("sink lock").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_cancelled() {
        let source = live_source();
        let sink = Arc::new(RecordingSink::default());
        let session = CaptureSession::new(source, sink, LapConfirmation::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(session.run(PollRate::from_millis(20), cancel.clone()));
        tokio::time::sleep(Duration::from_millis(205)).await;
        cancel.cancel();

        let stats = task.await.expect("capture task");
        // Ticks at 0, 20, ..., 200
        assert_eq!(stats.frames, 11);
        assert_eq!(stats.laps_completed, 0);
    }

    fn timing_at(position: f32, completed_laps: i32, last_time_ms: i32) -> GraphicsInfo {
        GraphicsInfo { completed_laps, last_time_ms, ..graphics_at(position, true) }
    }

    fn tick_through(
        session: &mut CaptureSession<MemorySource, RecordingSink>,
        source: &MemorySource,
        graphics: Vec<GraphicsInfo>,
    ) {
        for g in graphics {
            source.publish_graphics(g);
            session.tick();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_confirmations_resolve_independently() {
        let source = live_source();
        let sink = Arc::new(RecordingSink::default());
        let confirmation = LapConfirmation::new(ConfirmationConfig {
            initial_delay_ms: 1_000,
            window_ms: 2_000,
            retry_interval_ms: 50,
        });
        let mut session = CaptureSession::new(Arc::clone(&source), Arc::clone(&sink), confirmation);

        // Lap A closes at t=0, its broadcast summary never arrives
        tick_through(
            &mut session,
            &source,
            vec![
                timing_at(0.0, 5, 98_765),
                timing_at(0.3, 5, 98_765),
                timing_at(0.6, 5, 98_765),
                timing_at(0.97, 5, 98_765),
                timing_at(0.02, 6, 101_000),
            ],
        );
        assert_eq!(session.stats().laps_completed, 1);

        // Lap B closes at t=0.5s while A is still waiting
        tokio::time::sleep(Duration::from_millis(500)).await;
        tick_through(
            &mut session,
            &source,
            vec![timing_at(0.3, 6, 101_000), timing_at(0.97, 6, 101_000), timing_at(0.01, 7, 99_500)],
        );
        assert_eq!(session.stats().laps_completed, 2);

        // Capture keeps going while both confirmations are in flight
        tokio::time::sleep(Duration::from_secs(1)).await;
        tick_through(&mut session, &source, vec![timing_at(0.1, 7, 99_500), timing_at(0.2, 7, 99_500)]);
        assert_eq!(session.detector().open_lap().len(), 3);
        assert_eq!(session.stats().frames, 10);
        assert!(sink.laps.lock().expect("sink lock").is_empty());

        // A's window closed at t=3s. B polls until t=3.5s.
        tokio::time::sleep(Duration::from_millis(1_700)).await;
        source.publish_summary(LapSummary {
            car_index: 1003,
            completed_laps: 7,
            last_lap_time_ms: 99_500,
            valid_for_best: true,
        });
        tokio::time::sleep(Duration::from_millis(500)).await;

        let stored = sink.laps.lock().expect("sink lock").clone();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].lap_number, 6);
        assert_eq!(stored[0].lap_time_ms, 99_500);
        assert_eq!(stored[0].frames.len(), 3);
    }
}
