//! Windows backend driven through a helper executable.
//!
//! The helper ships next to the daemon binary. With no arguments it prints
//! `"<volume> <muted>"` (`muted` is `0` or `1`); with one argument it sets the
//! volume (`"60"`) or the mute flag (`"mute"` / `"unmute"`).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use volsync_core::{AudioBackend, BackendError, BackendResult, VolumeState};

use crate::process;

/// File name of the helper executable.
pub const HELPER_EXE: &str = "adjust_get_current_system_volume_vista_plus.exe";

/// System volume through the bundled helper executable.
pub struct HelperExeBackend {
    exe: PathBuf,
    timeout: Duration,
}

impl HelperExeBackend {
    #[must_use]
    pub fn new(exe: PathBuf, timeout: Duration) -> Self {
        Self { exe, timeout }
    }

    /// Use the helper located in the same directory as the running binary.
    ///
    /// # Errors
    /// Returns an error if the current executable path cannot be determined.
    pub fn beside_current_exe(timeout: Duration) -> BackendResult<Self> {
        let current = std::env::current_exe()
            .map_err(|source| BackendError::Spawn { program: HELPER_EXE.to_string(), source })?;
        let exe = current.with_file_name(HELPER_EXE);
        debug!(exe = %exe.display(), "Using volume helper executable");
        Ok(Self::new(exe, timeout))
    }

    async fn helper(&self, args: &[&str]) -> BackendResult<String> {
        let program = self.exe.to_string_lossy();
        process::run(&program, args, self.timeout).await
    }
}

#[async_trait]
impl AudioBackend for HelperExeBackend {
    fn name(&self) -> &'static str {
        "helper-exe"
    }

    async fn get(&self) -> BackendResult<VolumeState> {
        let output = self.helper(&[]).await?;
        parse_helper_output(&output)
    }

    async fn set_volume(&self, volume: u8) -> BackendResult<()> {
        let arg = volume.to_string();
        self.helper(&[arg.as_str()]).await?;
        Ok(())
    }

    async fn set_muted(&self, muted: bool) -> BackendResult<()> {
        self.helper(&[if muted { "mute" } else { "unmute" }]).await?;
        Ok(())
    }
}

/// Parse the helper's `"<volume> <muted>"` output.
///
/// # Errors
/// Returns an error if either number is missing or not an integer.
pub fn parse_helper_output(output: &str) -> BackendResult<VolumeState> {
    let mut parts = output.split_whitespace();
    let volume = parts.next().and_then(|v| v.parse::<i64>().ok());
    let muted = parts.next().and_then(|m| m.parse::<i64>().ok());

    match (volume, muted) {
        (Some(volume), Some(muted)) => Ok(VolumeState::new(volume, muted != 0)),
        _ => Err(BackendError::Parse(format!("unexpected helper output: {}", output.trim()))),
    }
}
