//! Subscriber setup for hosts that don't install their own
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the given default
//! directive (for example `"lapcapture=info"`).

use tracing_subscriber::EnvFilter;

use crate::{CaptureError, Result};

fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a global fmt subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init(default_directive: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .with_target(true)
        .try_init()
        .map_err(|e| CaptureError::config_error(format!("logging: {}", e)))
}

/// Like [`init`], but ignores an already installed subscriber. Returns whether this
/// call installed it.
///
/// Writes to stdout like [`init`]. Tests that want output captured per test should use
/// [`test_subscriber`] instead.
pub fn try_init(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Subscriber that writes through the test harness's output capture.
///
/// Install with `tracing::subscriber::set_default` for the scope of one test.
pub fn test_subscriber(
    default_directive: &str,
) -> impl tracing::Subscriber + Send + Sync + use<> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .with_test_writer()
        .finish()
}
