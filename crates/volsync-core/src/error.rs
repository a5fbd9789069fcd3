//! Error types for Volsync core.

use std::time::Duration;

use thiserror::Error;

/// Error returned by [`crate::VolumeController`] operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value is outside the operation's accepted range.
    #[error("Invalid value for {action}. Must be between {min} and {max}.")]
    Validation { action: &'static str, min: i64, max: i64 },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl Error {
    /// Whether this is a validation failure (no state was touched).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Result type alias for Volsync core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a platform audio call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed { program: String, status: String, stderr: String },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("Failed to parse backend output: {0}")]
    Parse(String),

    #[error("Audio device unavailable")]
    Unavailable,

    #[error("Unsupported platform: {0}")]
    Unsupported(String),
}

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Rejected configuration snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid port specified in the configuration: {0}")]
    InvalidPort(u16),

    #[error("Invalid polling interval: {0} ms (must be greater than zero)")]
    InvalidInterval(u64),
}
