//! In-process telemetry source
//!
//! The host publishes views into a [`MemorySource`] (from a replay, a bridge to the
//! simulator running in another process, or a test) and the engine reads them back
//! through [`TelemetrySource`]. Each view is a latest-value cell, so readers always see
//! the most recent publish and never block a publisher.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::source::TelemetrySource;
use crate::types::{GraphicsInfo, LapSummary, PhysicsInfo, StaticInfo};
use crate::{CaptureError, Result};

/// Telemetry source backed by latest-value cells
pub struct MemorySource {
    static_info: watch::Sender<Option<StaticInfo>>,
    physics: watch::Sender<Option<PhysicsInfo>>,
    graphics: watch::Sender<Option<GraphicsInfo>>,
    summary: watch::Sender<Option<LapSummary>>,
    reachable: AtomicBool,
    attached: AtomicBool,
    connect_attempts: AtomicU32,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    /// Create an empty, reachable source
    pub fn new() -> Self {
        Self {
            static_info: watch::Sender::new(None),
            physics: watch::Sender::new(None),
            graphics: watch::Sender::new(None),
            summary: watch::Sender::new(None),
            reachable: AtomicBool::new(true),
            attached: AtomicBool::new(false),
            connect_attempts: AtomicU32::new(0),
        }
    }

    pub fn publish_static(&self, info: StaticInfo) {
        self.static_info.send_replace(Some(info));
    }

    pub fn publish_physics(&self, physics: PhysicsInfo) {
        self.physics.send_replace(Some(physics));
    }

    pub fn publish_graphics(&self, graphics: GraphicsInfo) {
        self.graphics.send_replace(Some(graphics));
    }

    /// Update the current graphics page in place
    ///
    /// No-op when no graphics page has been published yet.
    pub fn update_graphics(&self, update: impl FnOnce(&mut GraphicsInfo)) {
        self.graphics.send_if_modified(|current| match current {
            Some(graphics) => {
                update(graphics);
                true
            }
            None => false,
        });
    }

    pub fn publish_summary(&self, summary: LapSummary) {
        trace!(car_index = summary.car_index, laps = summary.completed_laps, "Broadcast summary");
        self.summary.send_replace(Some(summary));
    }

    /// Drop the physics and graphics pages, as happens when the simulator exits
    pub fn clear_live_views(&self) {
        self.physics.send_replace(None);
        self.graphics.send_replace(None);
    }

    /// Make subsequent `connect` calls fail or succeed
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Number of `connect` calls so far
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }
}

impl TelemetrySource for MemorySource {
    fn connect(&self) -> Result<()> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.reachable.load(Ordering::SeqCst) {
            return Err(CaptureError::connection_failed("memory source is not reachable"));
        }

        if !self.attached.swap(true, Ordering::SeqCst) {
            debug!("Memory source attached");
        }
        Ok(())
    }

    fn close(&self) {
        if self.attached.swap(false, Ordering::SeqCst) {
            debug!("Memory source released");
        }
    }

    fn static_view(&self) -> Option<StaticInfo> {
        self.static_info.borrow().clone()
    }

    fn physics_view(&self) -> Option<PhysicsInfo> {
        self.physics.borrow().clone()
    }

    fn graphics_view(&self) -> Option<GraphicsInfo> {
        self.graphics.borrow().clone()
    }

    fn latest_broadcast_summary(&self) -> Option<LapSummary> {
        *self.summary.borrow()
    }
}
