//! Volume controller - the stable operation set over a platform backend.

use std::sync::Arc;

use tracing::debug;

use crate::action::Action;
use crate::backend::AudioBackend;
use crate::error::{Error, Result};
use crate::state::{VolumeState, clamp_volume};

/// Normalizes backend calls into set/get/mute/unmute/toggle/increase/decrease.
///
/// Cheap to clone; clones share the backend. Reads and writes are separate
/// backend calls, so a read-modify-write (`toggle_mute`, `increase_volume`,
/// `decrease_volume`) can race with another writer. Last writer wins.
#[derive(Clone)]
pub struct VolumeController {
    backend: Arc<dyn AudioBackend>,
}

impl std::fmt::Debug for VolumeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeController").field("backend", &self.backend.name()).finish()
    }
}

impl VolumeController {
    #[must_use]
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self { backend }
    }

    /// Name of the underlying backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Best-effort snapshot of volume and mute.
    ///
    /// # Errors
    /// Returns an error if the backend call fails.
    pub async fn get_state(&self) -> Result<VolumeState> {
        let state = self.backend.get().await?;
        Ok(VolumeState::new(i64::from(state.volume), state.muted))
    }

    /// Set the absolute volume.
    ///
    /// # Errors
    /// Returns a validation error unless `value` is in `0..=100`, or a backend error.
    pub async fn set_volume(&self, value: i64) -> Result<VolumeState> {
        check_range(Action::SetVolume, value, 0, 100)?;
        self.apply_volume(clamp_volume(value)).await
    }

    /// Raise the volume by `delta`, saturating at 100.
    ///
    /// # Errors
    /// Returns a validation error unless `delta` is in `1..=99`, or a backend error.
    pub async fn increase_volume(&self, delta: i64) -> Result<VolumeState> {
        check_range(Action::IncreaseVolume, delta, 1, 99)?;
        let current = self.get_state().await?;
        self.apply_volume(clamp_volume(i64::from(current.volume) + delta)).await
    }

    /// Lower the volume by `delta`, saturating at 0.
    ///
    /// # Errors
    /// Returns a validation error unless `delta` is in `1..=99`, or a backend error.
    pub async fn decrease_volume(&self, delta: i64) -> Result<VolumeState> {
        check_range(Action::DecreaseVolume, delta, 1, 99)?;
        let current = self.get_state().await?;
        self.apply_volume(clamp_volume(i64::from(current.volume) - delta)).await
    }

    /// # Errors
    /// Returns an error if the backend call fails.
    pub async fn mute(&self) -> Result<VolumeState> {
        self.apply_muted(true).await
    }

    /// # Errors
    /// Returns an error if the backend call fails.
    pub async fn unmute(&self) -> Result<VolumeState> {
        self.apply_muted(false).await
    }

    /// Invert the current mute flag.
    ///
    /// # Errors
    /// Returns an error if a backend call fails.
    pub async fn toggle_mute(&self) -> Result<VolumeState> {
        let current = self.get_state().await?;
        self.apply_muted(!current.muted).await
    }

    /// Run `action` with an optional integer argument.
    ///
    /// A missing argument fails the action's range check.
    ///
    /// # Errors
    /// Returns the action's validation error or a backend error.
    pub async fn execute(&self, action: Action, value: Option<i64>) -> Result<VolumeState> {
        match action {
            Action::GetState => self.get_state().await,
            Action::SetVolume => self.set_volume(required(action, value, 0, 100)?).await,
            Action::IncreaseVolume => self.increase_volume(required(action, value, 1, 99)?).await,
            Action::DecreaseVolume => self.decrease_volume(required(action, value, 1, 99)?).await,
            Action::Mute => self.mute().await,
            Action::Unmute => self.unmute().await,
            Action::ToggleMute => self.toggle_mute().await,
        }
    }

    async fn apply_volume(&self, volume: u8) -> Result<VolumeState> {
        debug!(volume, backend = self.backend.name(), "Setting volume");
        self.backend.set_volume(volume).await?;
        self.get_state().await
    }

    async fn apply_muted(&self, muted: bool) -> Result<VolumeState> {
        debug!(muted, backend = self.backend.name(), "Setting mute");
        self.backend.set_muted(muted).await?;
        self.get_state().await
    }
}

fn check_range(action: Action, value: i64, min: i64, max: i64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::Validation { action: action.name(), min, max })
    }
}

fn required(action: Action, value: Option<i64>, min: i64, max: i64) -> Result<i64> {
    value.ok_or(Error::Validation { action: action.name(), min, max })
}
