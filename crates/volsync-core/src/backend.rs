//! Platform audio capability.
//!
//! The core only needs to read the current state and set volume or mute.
//! Each target OS provides one implementation, chosen once at startup.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{BackendError, BackendResult};
use crate::state::VolumeState;

/// Reads and writes the host's output volume and mute state.
///
/// Every call may be an out-of-process round trip. Implementations must not
/// retry internally and must bound how long a call can take.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Read the current volume and mute flag.
    async fn get(&self) -> BackendResult<VolumeState>;

    /// Set the absolute volume percentage (already validated to `0..=100`).
    async fn set_volume(&self, volume: u8) -> BackendResult<()>;

    /// Set the mute flag.
    async fn set_muted(&self, muted: bool) -> BackendResult<()>;
}

/// In-process backend holding the state in memory.
///
/// Used for headless runs and tests. [`MemoryBackend::set_available`] makes
/// every call fail as if the device disappeared.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryDevice>,
}

#[derive(Debug)]
struct MemoryDevice {
    state: VolumeState,
    available: bool,
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self { state: VolumeState::default(), available: true }
    }
}

impl MemoryBackend {
    /// Create a backend starting at `initial`.
    #[must_use]
    pub fn new(initial: VolumeState) -> Self {
        Self { inner: Mutex::new(MemoryDevice { state: initial, available: true }) }
    }

    /// Current state without going through the async interface.
    #[must_use]
    pub fn state(&self) -> VolumeState {
        self.inner.lock().state
    }

    /// Change the state from outside, like another application would.
    pub fn set_external(&self, state: VolumeState) {
        self.inner.lock().state = state;
    }

    /// Simulate the device appearing or disappearing.
    pub fn set_available(&self, available: bool) {
        self.inner.lock().available = available;
    }

    fn with_device<T>(&self, f: impl FnOnce(&mut VolumeState) -> T) -> BackendResult<T> {
        let mut device = self.inner.lock();
        if !device.available {
            return Err(BackendError::Unavailable);
        }
        Ok(f(&mut device.state))
    }
}

#[async_trait]
impl AudioBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self) -> BackendResult<VolumeState> {
        self.with_device(|state| *state)
    }

    async fn set_volume(&self, volume: u8) -> BackendResult<()> {
        trace!(volume, "memory backend set volume");
        self.with_device(|state| state.volume = volume)
    }

    async fn set_muted(&self, muted: bool) -> BackendResult<()> {
        trace!(muted, "memory backend set mute");
        self.with_device(|state| state.muted = muted)
    }
}
