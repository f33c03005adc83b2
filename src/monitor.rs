//! Session monitor
//!
//! A long-lived task that owns the connection to the telemetry source. On every
//! monitor tick it checks whether a live session is running and starts or stops the
//! frame capture loop to match. Ticks are spaced by the configured monitor interval,
//! and the first tick fires immediately.
//!
//! ```text
//!            connect ok + live
//! Disconnected ─────────────────▶ Online
//!      ▲                            │
//!      └────────────────────────────┘
//!          page missing / not live
//! ```
//!
//! Connection failures are logged and retried on the next tick. Nothing here ever
//! gives up.

use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::capture::CaptureSession;
use crate::config::CaptureConfig;
use crate::confirm::LapConfirmation;
use crate::persist::LapSink;
use crate::source::TelemetrySource;
use crate::types::PollRate;

/// Whether a live session is being captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Online,
}

/// Handle to a running monitor
///
/// Dropping the handle stops the monitor and any capture it started. Confirmation
/// tasks already in flight run to completion.
pub struct MonitorHandle {
    status: watch::Receiver<SessionStatus>,
    poll_rate: watch::Sender<PollRate>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Current session status
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Status transitions, starting with the current status
    pub fn status_updates(&self) -> impl Stream<Item = SessionStatus> + 'static {
        WatchStream::new(self.status.clone())
    }

    /// Wait until the monitor reports `status`.
    ///
    /// Returns `false` if the monitor stopped first.
    pub async fn wait_for(&self, status: SessionStatus) -> bool {
        let mut rx = self.status.clone();
        rx.wait_for(|current| *current == status).await.is_ok()
    }

    /// Poll rate used by the next capture started. A running capture keeps its rate.
    pub fn set_poll_rate(&self, rate: PollRate) {
        debug!(poll_rate_ms = rate.millis(), "Poll rate updated");
        self.poll_rate.send_replace(rate);
    }

    pub fn poll_rate(&self) -> PollRate {
        *self.poll_rate.borrow()
    }

    /// Ask the monitor to stop without waiting for it
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Stop the monitor and wait for it to finish
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Session monitor task failed: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        debug!("Dropping session monitor handle");
        self.cancel.cancel();
    }
}

/// Watches the source and drives capture sessions
pub struct SessionMonitor<S: ?Sized, K: ?Sized> {
    source: Arc<S>,
    sink: Arc<K>,
    confirmation: LapConfirmation,
    interval: Duration,
    poll_rate: watch::Receiver<PollRate>,
    status: watch::Sender<SessionStatus>,
    cancel: CancellationToken,
}

impl<S, K> SessionMonitor<S, K>
where
    S: TelemetrySource + ?Sized,
    K: LapSink + ?Sized,
{
    /// Spawn the monitor task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(source: Arc<S>, sink: Arc<K>, config: &CaptureConfig) -> MonitorHandle {
        let (status_tx, status_rx) = watch::channel(SessionStatus::Disconnected);
        let (poll_tx, poll_rx) = watch::channel(config.poll_rate());
        let cancel = CancellationToken::new();

        let monitor = Self {
            source,
            sink,
            confirmation: LapConfirmation::new(config.confirmation),
            interval: config.monitor_interval(),
            poll_rate: poll_rx,
            status: status_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(monitor.run());

        MonitorHandle { status: status_rx, poll_rate: poll_tx, cancel, task: Some(task) }
    }

    async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Session monitor started");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut capture: Option<CancellationToken> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            capture = match capture {
                Some(token) => self.check_online(token),
                None => self.try_go_online(),
            };
        }

        if let Some(token) = capture {
            token.cancel();
        }
        self.publish(SessionStatus::Disconnected);
        self.source.close();
        info!("Session monitor stopped");
    }

    /// Online tick: keep capturing while the session is live
    fn check_online(&self, capture: CancellationToken) -> Option<CancellationToken> {
        if self.session_is_live() {
            return Some(capture);
        }

        info!("Session offline");
        capture.cancel();
        self.publish(SessionStatus::Disconnected);
        None
    }

    /// Offline tick: connect, then start capturing if a session is live
    fn try_go_online(&self) -> Option<CancellationToken> {
        if let Err(e) = self.source.connect() {
            error!("Failed to connect to telemetry source, trying again: {}", e);
            return None;
        }

        if !self.session_is_live() {
            debug!("Connected, but no live session");
            self.source.close();
            return None;
        }

        let poll_rate = *self.poll_rate.borrow();
        info!(poll_rate_ms = poll_rate.millis(), "Session online");

        let token = self.cancel.child_token();
        let session =
            CaptureSession::new(Arc::clone(&self.source), Arc::clone(&self.sink), self.confirmation);
        tokio::spawn(session.run(poll_rate, token.clone()));

        self.publish(SessionStatus::Online);
        Some(token)
    }

    fn session_is_live(&self) -> bool {
        self.source.graphics_view().is_some_and(|g| g.status.is_live())
    }

    fn publish(&self, status: SessionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::sources::MemorySource;
    use crate::types::{GraphicsInfo, Lap, SimStatus};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::path::PathBuf;
    use tokio::time::sleep;

    struct NullSink;

    #[async_trait]
    impl LapSink for NullSink {
        async fn store(&self, _lap: Lap) -> Result<PathBuf> {
            Ok(PathBuf::new())
        }
    }

    fn config() -> CaptureConfig {
        CaptureConfig::new("unused")
    }

    fn with_status(source: &MemorySource, status: SimStatus) {
        source.publish_graphics(GraphicsInfo { status, ..Default::default() });
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_source_is_retried_every_interval() {
        let source = Arc::new(MemorySource::new());
        source.set_reachable(false);

        let handle = SessionMonitor::spawn(Arc::clone(&source), Arc::new(NullSink), &config());
        sleep(Duration::from_secs(25)).await;

        // Ticks at 0s, 10s and 20s
        assert_eq!(source.connect_attempts(), 3);
        assert_eq!(handle.status(), SessionStatus::Disconnected);
        assert!(handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn connected_but_not_live_releases_the_source() {
        let source = Arc::new(MemorySource::new());
        with_status(&source, SimStatus::Replay);

        let handle = SessionMonitor::spawn(Arc::clone(&source), Arc::new(NullSink), &config());
        sleep(Duration::from_secs(1)).await;

        assert_eq!(source.connect_attempts(), 1);
        assert!(!source.is_attached());
        assert_eq!(handle.status(), SessionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn live_session_goes_online_and_back() {
        let source = Arc::new(MemorySource::new());
        with_status(&source, SimStatus::Live);

        let handle = SessionMonitor::spawn(Arc::clone(&source), Arc::new(NullSink), &config());
        assert!(handle.wait_for(SessionStatus::Online).await);
        assert!(source.is_attached());

        source.update_graphics(|g| g.status = SimStatus::Pause);
        sleep(Duration::from_secs(11)).await;
        assert_eq!(handle.status(), SessionStatus::Disconnected);

        // Connect is not retried while online
        let attempts = source.connect_attempts();
        source.update_graphics(|g| g.status = SimStatus::Live);
        assert!(handle.wait_for(SessionStatus::Online).await);
        assert_eq!(source.connect_attempts(), attempts + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_graphics_page_counts_as_offline() {
        let source = Arc::new(MemorySource::new());
        with_status(&source, SimStatus::Live);

        let handle = SessionMonitor::spawn(Arc::clone(&source), Arc::new(NullSink), &config());
        assert!(handle.wait_for(SessionStatus::Online).await);

        source.clear_live_views();
        sleep(Duration::from_secs(11)).await;
        assert_eq!(handle.status(), SessionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn status_stream_reports_transitions_once() {
        let source = Arc::new(MemorySource::new());
        with_status(&source, SimStatus::Live);

        let handle = SessionMonitor::spawn(Arc::clone(&source), Arc::new(NullSink), &config());
        let mut updates = handle.status_updates();

        assert_eq!(updates.next().await, Some(SessionStatus::Disconnected));
        assert_eq!(updates.next().await, Some(SessionStatus::Online));

        with_status(&source, SimStatus::Off);
        assert_eq!(updates.next().await, Some(SessionStatus::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_task_and_releases_the_source() {
        let source = Arc::new(MemorySource::new());
        with_status(&source, SimStatus::Live);

        let handle = SessionMonitor::spawn(Arc::clone(&source), Arc::new(NullSink), &config());
        assert!(handle.wait_for(SessionStatus::Online).await);

        let status = handle.status.clone();
        handle.stop().await;

        assert_eq!(*status.borrow(), SessionStatus::Disconnected);
        assert!(!source.is_attached());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_rate_change_applies_to_next_capture() {
        let source = Arc::new(MemorySource::new());
        let handle = SessionMonitor::spawn(source, Arc::new(NullSink), &config());

        assert_eq!(handle.poll_rate().millis(), 10);
        handle.set_poll_rate(PollRate::from_millis(55));
        assert_eq!(handle.poll_rate().millis(), 60);
    }
}
