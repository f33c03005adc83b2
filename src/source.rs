//! Source trait for telemetry handles

use crate::Result;
use crate::types::{GraphicsInfo, LapSummary, PhysicsInfo, StaticInfo};

/// Trait for telemetry handles
///
/// A source wraps the simulator's shared-memory pages and its broadcast channel.
/// The handle is shared as `Arc<S>` between the connection monitor, the capture loop
/// and every in-flight lap confirmation, so all reads take `&self` and must be safe
/// to call concurrently. Reads never block: a view that is not available right now
/// is `None`.
pub trait TelemetrySource: Send + Sync + 'static {
    /// Attach to the simulator.
    ///
    /// Called repeatedly by the monitor while disconnected, so it must tolerate
    /// being called on an already attached handle.
    fn connect(&self) -> Result<()>;

    /// Release the attachment made by [`connect`](Self::connect)
    fn close(&self);

    /// Session metadata (car, track, driver)
    fn static_view(&self) -> Option<StaticInfo>;

    /// Latest physics page
    fn physics_view(&self) -> Option<PhysicsInfo>;

    /// Latest graphics page, including status and lap counters
    fn graphics_view(&self) -> Option<GraphicsInfo>;

    /// Most recent broadcast lap report, if any has arrived
    fn latest_broadcast_summary(&self) -> Option<LapSummary>;
}
