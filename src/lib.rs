//! Lap capture engine for racing simulator telemetry.
//!
//! `lapcapture` samples a simulator's shared-memory telemetry while a live session is
//! running, splits the samples into laps, confirms each lap against the simulator's
//! delayed broadcast channel and stages confirmed laps as gzip-compressed protobuf
//! files for an external uploader.
//!
//! # Pipeline
//!
//! - [`monitor`]: watches the source and starts or stops capture as sessions go live
//! - [`capture`]: samples the source on every poll tick and builds [`Frame`]s
//! - [`detector`]: finds lap boundaries and drops partial or invalid laps
//! - [`confirm`]: waits for a broadcast summary that corroborates each completed lap
//! - [`persist`]: encodes, compresses and writes confirmed laps
//!
//! The simulator is reached through the [`TelemetrySource`] trait. [`MemorySource`]
//! is an in-process implementation the host can publish views into.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lapcapture::{CaptureConfig, LapCapture, MemorySource, SessionStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     lapcapture::logging::init("lapcapture=info")?;
//!
//!     let config = CaptureConfig::from_yaml_file("capture.yaml")?;
//!     let source = Arc::new(MemorySource::new());
//!     let monitor = LapCapture::spawn_with_staging(Arc::clone(&source), &config);
//!
//!     monitor.wait_for(SessionStatus::Online).await;
//!     // ... the host keeps publishing views into `source` ...
//!     monitor.stop().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod capture;
pub mod config;
pub mod confirm;
pub mod detector;
mod error;
pub mod logging;
pub mod monitor;
pub mod persist;
pub mod source;
pub mod sources;
pub mod types;

pub use capture::{CaptureSession, CaptureStats};
pub use config::{CaptureConfig, ConfirmationConfig};
pub use confirm::{ConfirmOutcome, LapConfirmation};
pub use detector::{Boundary, DiscardReason, LapDetector};
pub use error::*;
pub use monitor::{MonitorHandle, SessionMonitor, SessionStatus};
pub use persist::{LapSink, StagingStore, load_lap};
pub use source::TelemetrySource;
pub use sources::MemorySource;
pub use types::*;

/// Entry point for hosts
pub struct LapCapture;

impl LapCapture {
    /// Start monitoring `source`, handing confirmed laps to `sink`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S, K>(source: Arc<S>, sink: Arc<K>, config: &CaptureConfig) -> MonitorHandle
    where
        S: TelemetrySource + ?Sized,
        K: LapSink + ?Sized,
    {
        SessionMonitor::spawn(source, sink, config)
    }

    /// Start monitoring `source`, staging confirmed laps in `config.staging_dir`
    pub fn spawn_with_staging<S>(source: Arc<S>, config: &CaptureConfig) -> MonitorHandle
    where
        S: TelemetrySource + ?Sized,
    {
        let store = Arc::new(StagingStore::new(&config.staging_dir));
        Self::spawn(source, store, config)
    }
}
