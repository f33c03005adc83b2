//! Error types for lap capture.
//!
//! Only a few failures ever reach a caller. A connection error surfaces from
//! [`TelemetrySource::connect`](crate::TelemetrySource::connect) and the monitor swallows
//! it and retries. A persistence error surfaces from
//! [`LapSink::store`](crate::LapSink::store). Missing views, invalid laps and
//! unconfirmed laps are not errors. They are logged and the lap is dropped.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: the telemetry source could not be attached
//! - **Persistence Errors**: a staged lap file could not be written or read
//! - **Codec Errors**: a lap payload failed to encode or decode
//! - **Configuration Errors**: invalid or unreadable capture configuration
//!
//! ```rust
//! use lapcapture::CaptureError;
//!
//! let error = CaptureError::connection_failed("simulator not running");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for capture operations.
pub type Result<T, E = CaptureError> = std::result::Result<T, E>;

/// Main error type for capture operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CaptureError {
    #[error("Failed to connect to telemetry source: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Lap file error: {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode lap: {details}")]
    Encode { details: String },

    #[error("Failed to decode lap: {details}")]
    Decode { details: String },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Unsupported value {value} for '{field}'")]
    UnsupportedValue { field: String, value: i64 },
}

impl CaptureError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CaptureError::Connection { .. } => true,
            CaptureError::Persist { .. } => true,
            CaptureError::Encode { .. } => false,
            CaptureError::Decode { .. } => false,
            CaptureError::Config { .. } => false,
            CaptureError::UnsupportedValue { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            CaptureError::Connection { .. } => vec![
                "Ensure the simulator is running",
                "Check that a session is loaded and on track",
                "Verify the broadcasting port is configured",
            ],
            CaptureError::Persist { .. } => vec![
                "Check the staging directory exists",
                "Ensure sufficient disk space",
                "Check directory permissions",
            ],
            CaptureError::Encode { .. } => vec![
                "Verify lap metadata is well formed",
                "Report the lap that failed to encode",
            ],
            CaptureError::Decode { .. } => vec![
                "Check the file is a staged lap (.lap.gzip)",
                "Verify the file was not truncated during write",
            ],
            CaptureError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Use durations in milliseconds",
                "Set a non-empty staging directory",
            ],
            CaptureError::UnsupportedValue { .. } => vec![
                "Check the simulator version is supported",
                "Update the library to a compatible version",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        CaptureError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        CaptureError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for persistence errors with path context.
    pub fn persist_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Persist { path: path.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(details: impl Into<String>) -> Self {
        CaptureError::Config { details: details.into() }
    }

    /// Helper constructor for out-of-range source values.
    pub fn unsupported_value(field: impl Into<String>, value: i64) -> Self {
        CaptureError::UnsupportedValue { field: field.into(), value }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Persist { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<prost::DecodeError> for CaptureError {
    fn from(err: prost::DecodeError) -> Self {
        CaptureError::Decode { details: err.to_string() }
    }
}

impl From<prost::EncodeError> for CaptureError {
    fn from(err: prost::EncodeError) -> Self {
        CaptureError::Encode { details: err.to_string() }
    }
}

impl From<serde_yaml_ng::Error> for CaptureError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        CaptureError::Config { details: err.to_string() }
    }
}
