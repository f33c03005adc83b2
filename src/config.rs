//! Capture configuration
//!
//! The host application resolves configuration once and hands it to
//! [`LapCapture`](crate::LapCapture). All durations are in milliseconds.
//!
//! ```yaml
//! poll_rate_ms: 20
//! staging_dir: /var/lib/racemate/upload
//! monitor_interval_ms: 10000
//! confirmation:
//!   initial_delay_ms: 5000
//!   window_ms: 10000
//!   retry_interval_ms: 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::types::PollRate;
use crate::{CaptureError, Result};

/// Timings for the lap confirmation protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Wait before the first broadcast poll, giving the delayed channel time to catch up
    pub initial_delay_ms: u64,
    /// Total polling budget after the initial delay
    pub window_ms: u64,
    /// Sleep between broadcast polls
    pub retry_interval_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self { initial_delay_ms: 5_000, window_ms: 10_000, retry_interval_ms: 50 }
    }
}

impl ConfirmationConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Full configuration for one capture engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub poll_rate_ms: PollRate,

    /// Directory the uploader watches for staged laps
    pub staging_dir: PathBuf,

    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,
}

fn default_monitor_interval_ms() -> u64 {
    10_000
}

impl CaptureConfig {
    /// Configuration with defaults for everything but the staging directory
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            poll_rate_ms: PollRate::default(),
            staging_dir: staging_dir.into(),
            monitor_interval_ms: default_monitor_interval_ms(),
            confirmation: ConfirmationConfig::default(),
        }
    }

    pub fn with_poll_rate(mut self, rate: PollRate) -> Self {
        self.poll_rate_ms = rate;
        self
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationConfig) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn poll_rate(&self) -> PollRate {
        self.poll_rate_ms
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    /// Parse and validate YAML configuration
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: CaptureConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading capture config from {}", path.display());

        let yaml = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::config_error(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.staging_dir.as_os_str().is_empty() {
            return Err(CaptureError::config_error("staging_dir must not be empty"));
        }
        if self.monitor_interval_ms == 0 {
            return Err(CaptureError::config_error("monitor_interval_ms must be positive"));
        }
        if self.confirmation.window_ms == 0 {
            return Err(CaptureError::config_error("confirmation.window_ms must be positive"));
        }
        if self.confirmation.retry_interval_ms == 0 {
            return Err(CaptureError::config_error(
                "confirmation.retry_interval_ms must be positive",
            ));
        }
        Ok(())
    }
}
