//! macOS backend driven through `osascript`.

use std::time::Duration;

use async_trait::async_trait;

use volsync_core::{AudioBackend, BackendError, BackendResult, VolumeState};

use crate::process;

const OSASCRIPT: &str = "osascript";

/// System volume through AppleScript volume settings.
pub struct OsaScriptBackend {
    timeout: Duration,
}

impl OsaScriptBackend {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn script(&self, script: &str) -> BackendResult<String> {
        process::run(OSASCRIPT, ["-e", script], self.timeout).await
    }
}

#[async_trait]
impl AudioBackend for OsaScriptBackend {
    fn name(&self) -> &'static str {
        "osascript"
    }

    async fn get(&self) -> BackendResult<VolumeState> {
        let output = self.script("get volume settings").await?;
        parse_volume_settings(&output)
    }

    async fn set_volume(&self, volume: u8) -> BackendResult<()> {
        self.script(&format!("set volume output volume {volume}")).await?;
        Ok(())
    }

    async fn set_muted(&self, muted: bool) -> BackendResult<()> {
        let with = if muted { "with" } else { "without" };
        self.script(&format!("set volume {with} output muted")).await?;
        Ok(())
    }
}

/// Parse the record printed for `get volume settings`.
///
/// Output looks like
/// `output volume:42, input volume:50, alert volume:100, output muted:false`.
/// Output devices without a software volume report `missing value`.
///
/// # Errors
/// Returns an error if either output field is missing or unreadable.
pub fn parse_volume_settings(output: &str) -> BackendResult<VolumeState> {
    let mut volume = None;
    let mut muted = None;

    for field in output.trim().split(',') {
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };
        match key.trim() {
            "output volume" => volume = value.trim().parse::<i64>().ok(),
            "output muted" => muted = value.trim().parse::<bool>().ok(),
            _ => {}
        }
    }

    match (volume, muted) {
        (Some(volume), Some(muted)) => Ok(VolumeState::new(volume, muted)),
        _ => Err(BackendError::Parse(format!("unexpected volume settings: {}", output.trim()))),
    }
}
