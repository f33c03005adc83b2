//! Lap confirmation protocol
//!
//! The shared-memory views report a lap's final time several seconds before the
//! simulator's broadcast channel reports the same lap with its own validity verdict.
//! A lap is only persisted once a broadcast summary corroborates it. The summary must
//! match the lap's car, the source's current completed-lap count and the polled
//! last-lap time. It must also mark the lap as counting towards best.
//!
//! Every completed lap gets its own confirmation task. Tasks are independent, so
//! several may be in flight at once. A task ends on the first matching summary, or
//! when its window runs out.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, trace};

use crate::CaptureError;
use crate::config::ConfirmationConfig;
use crate::persist::LapSink;
use crate::source::TelemetrySource;
use crate::types::{Lap, LapSummary};

/// The simulator reports this as the lap time when there is none
pub const NO_LAP_TIME: i32 = i32::MAX;

/// Terminal decision for one lap
#[derive(Debug)]
pub enum ConfirmOutcome {
    /// Corroborated and written by the sink
    Persisted(PathBuf),
    /// Corroborated, but the broadcast did not count it (or reported no time)
    Rejected { lap_time_ms: i32 },
    /// No matching summary within the window
    Unconfirmed,
    /// Corroborated, but the sink failed
    StoreFailed(CaptureError),
}

impl ConfirmOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, ConfirmOutcome::Persisted(_))
    }
}

/// Correlates completed laps with the broadcast channel before persisting them
#[derive(Debug, Clone, Copy, Default)]
pub struct LapConfirmation {
    config: ConfirmationConfig,
}

impl LapConfirmation {
    pub fn new(config: ConfirmationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfirmationConfig {
        &self.config
    }

    /// Run confirmation for `lap` on its own task.
    ///
    /// The task owns the lap. Callers usually drop the handle.
    pub fn spawn<S, K>(self, source: Arc<S>, lap: Lap, sink: Arc<K>) -> JoinHandle<ConfirmOutcome>
    where
        S: TelemetrySource + ?Sized,
        K: LapSink + ?Sized,
    {
        tokio::spawn(async move { self.confirm(source.as_ref(), lap, sink.as_ref()).await })
    }

    /// Wait for a corroborating summary, then persist or drop `lap`
    pub async fn confirm<S, K>(&self, source: &S, mut lap: Lap, sink: &K) -> ConfirmOutcome
    where
        S: TelemetrySource + ?Sized,
        K: LapSink + ?Sized,
    {
        sleep(self.config.initial_delay()).await;

        let deadline = Instant::now() + self.config.window();
        while Instant::now() < deadline {
            if let Some((summary, lap_time_ms)) = corroborating_summary(source, &lap) {
                lap.lap_time_ms = lap_time_ms;
                return Self::finish(lap, summary, sink).await;
            }
            sleep(self.config.retry_interval()).await;
        }

        debug!(
            track = %lap.track,
            timestamp = lap.timestamp,
            laptime = lap.lap_time_ms,
            "Could not confirm lap"
        );
        ConfirmOutcome::Unconfirmed
    }

    async fn finish<K>(lap: Lap, summary: LapSummary, sink: &K) -> ConfirmOutcome
    where
        K: LapSink + ?Sized,
    {
        let lap_time_ms = lap.lap_time_ms;

        if lap_time_ms == NO_LAP_TIME || !summary.valid_for_best {
            debug!(
                track = %lap.track,
                timestamp = lap.timestamp,
                laptime = lap_time_ms,
                valid_for_best = summary.valid_for_best,
                "Not valid lap"
            );
            return ConfirmOutcome::Rejected { lap_time_ms };
        }

        let track = lap.track.clone();
        match sink.store(lap).await {
            Ok(path) => {
                info!(track = %track, laptime = lap_time_ms, "Lap confirmed and saved");
                ConfirmOutcome::Persisted(path)
            }
            Err(e) => {
                error!(track = %track, laptime = lap_time_ms, "Failed to save confirmed lap: {}", e);
                ConfirmOutcome::StoreFailed(e)
            }
        }
    }
}

/// The latest broadcast summary and polled last-lap time, if they describe `lap`
///
/// Counters are read live on every poll, not captured when the lap was handed off.
fn corroborating_summary<S>(source: &S, lap: &Lap) -> Option<(LapSummary, i32)>
where
    S: TelemetrySource + ?Sized,
{
    let summary = source.latest_broadcast_summary()?;
    let graphics = source.graphics_view()?;

    trace!(
        car_index = summary.car_index,
        summary_laps = summary.completed_laps,
        polled_laps = graphics.completed_laps,
        summary_time = summary.last_lap_time_ms,
        polled_time = graphics.last_time_ms,
        "Checking broadcast summary"
    );

    summary
        .corroborates(lap.car_index, graphics.completed_laps, graphics.last_time_ms)
        .then_some((summary, graphics.last_time_ms))
}
