//! Volsync server - WebSocket control protocol and state synchronization.
//!
//! This crate ties the volume controller to remote clients: the
//! [`ControlServer`] accepts WebSocket connections and dispatches actions,
//! the [`StateMonitor`] samples the backend and broadcasts changes, and the
//! [`LifecycleManager`] rebuilds both whenever the configuration changes.

pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod monitor;
pub mod server;

pub use error::{LifecycleError, ServerError, ServerResult};
pub use lifecycle::LifecycleManager;
pub use monitor::{DeltaTracker, StateMonitor};
pub use server::ControlServer;
