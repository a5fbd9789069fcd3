//! Server error types.

use std::net::SocketAddr;

use thiserror::Error;
use volsync_core::ConfigError;

/// Control server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Failure to apply a configuration.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),
}
