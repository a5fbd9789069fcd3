//! Volsync Core - Volume state model, client actions and the volume controller.
//!
//! This crate contains the domain types shared by the backends, the control
//! server and the daemon. It knows nothing about sockets or operating systems;
//! platform access goes through the [`AudioBackend`] capability trait.

pub mod action;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod state;

pub use action::{Action, ActionRequest, ActionResponse};
pub use backend::{AudioBackend, MemoryBackend};
pub use config::{ConfigSnapshot, PollingConfig, WebSocketConfig};
pub use controller::VolumeController;
pub use error::{BackendError, BackendResult, ConfigError, Error, Result};
pub use state::{StateDelta, VolumeState};
