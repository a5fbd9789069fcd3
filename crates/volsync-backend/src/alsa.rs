//! ALSA backend driven through `amixer`.
//!
//! The first simple mixer control reported by `amixer` is treated as the
//! master control and cached once found.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::OnceCell;
use tracing::debug;

use volsync_core::{AudioBackend, BackendError, BackendResult, VolumeState};

use crate::process;

const AMIXER: &str = "amixer";

static DEFAULT_CONTROL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Simple mixer control '([a-z0-9 -]+)',[0-9]+").expect("mixer control pattern is valid")
});

// e.g. "  Front Left: Playback 42598 [65%] [-6.00dB] [on]"
static PLAYBACK_INFO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z][a-z ]*: Playback [0-9-]+ \[([0-9]+)%\] (?:\[[0-9.-]+dB\] )?\[(on|off)\]")
        .expect("playback pattern is valid")
});

/// System volume through the ALSA mixer.
pub struct AlsaBackend {
    control: OnceCell<String>,
    timeout: Duration,
}

impl AlsaBackend {
    /// Create a backend that discovers the mixer control on first use.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { control: OnceCell::new(), timeout }
    }

    /// Create a backend bound to a named control, e.g. `Master`.
    #[must_use]
    pub fn with_control(control: String, timeout: Duration) -> Self {
        Self { control: OnceCell::new_with(Some(control)), timeout }
    }

    async fn control(&self) -> BackendResult<&str> {
        let control = self
            .control
            .get_or_try_init(|| async {
                let listing = process::run(AMIXER, std::iter::empty::<&str>(), self.timeout).await?;
                let control = parse_default_control(&listing)?;
                debug!(control = %control, "Using ALSA mixer control");
                Ok::<_, BackendError>(control)
            })
            .await?;
        Ok(control.as_str())
    }

    async fn amixer_set(&self, setting: &str) -> BackendResult<()> {
        let control = self.control().await?;
        process::run(AMIXER, ["set", control, setting], self.timeout).await?;
        Ok(())
    }
}

#[async_trait]
impl AudioBackend for AlsaBackend {
    fn name(&self) -> &'static str {
        "alsa"
    }

    async fn get(&self) -> BackendResult<VolumeState> {
        let control = self.control().await?;
        let output = process::run(AMIXER, ["get", control], self.timeout).await?;
        parse_playback_info(&output)
    }

    async fn set_volume(&self, volume: u8) -> BackendResult<()> {
        self.amixer_set(&format!("{volume}%")).await
    }

    async fn set_muted(&self, muted: bool) -> BackendResult<()> {
        self.amixer_set(if muted { "mute" } else { "unmute" }).await
    }
}

/// Name of the first simple mixer control in `amixer` output.
///
/// # Errors
/// Returns an error if no control is listed.
pub fn parse_default_control(output: &str) -> BackendResult<String> {
    DEFAULT_CONTROL
        .captures(output)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| BackendError::Parse("no simple mixer control in amixer output".into()))
}

/// Volume and mute flag from `amixer get <control>` output.
///
/// The first playback channel line wins; `[off]` means muted.
///
/// # Errors
/// Returns an error if no playback line is present.
pub fn parse_playback_info(output: &str) -> BackendResult<VolumeState> {
    let caps = PLAYBACK_INFO
        .captures(output)
        .ok_or_else(|| BackendError::Parse("no playback line in amixer output".into()))?;

    let volume: i64 = caps[1]
        .parse()
        .map_err(|_| BackendError::Parse(format!("bad volume percentage: {}", &caps[1])))?;
    let muted = caps[2].eq_ignore_ascii_case("off");

    Ok(VolumeState::new(volume, muted))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const LISTING: &str = "\
Simple mixer control 'Master',0
  Capabilities: pvolume pswitch pswitch-joined
  Playback channels: Front Left - Front Right
  Limits: Playback 0 - 65536
  Mono:
  Front Left: Playback 42598 [65%] [on]
  Front Right: Playback 42598 [65%] [on]
Simple mixer control 'Capture',0
  Capabilities: cvolume cswitch
";

    const HARDWARE_GET: &str = "\
Simple mixer control 'PCM',0
  Capabilities: pvolume pswitch
  Playback channels: Front Left - Front Right
  Limits: Playback 0 - 255
  Mono:
  Front Left: Playback 122 [48%] [-17.25dB] [off]
  Front Right: Playback 122 [48%] [-17.25dB] [off]
";

    #[test]
    fn test_default_control_is_first_listed() {
        assert_eq!(parse_default_control(LISTING).unwrap(), "Master");
    }

    #[test]
    fn test_default_control_missing() {
        assert_matches!(parse_default_control("amixer: Mixer attach default error"), Err(BackendError::Parse(_)));
    }

    #[test]
    fn test_playback_without_db() {
        assert_eq!(parse_playback_info(LISTING).unwrap(), VolumeState::new(65, false));
    }

    #[test]
    fn test_playback_with_db_and_mute() {
        assert_eq!(parse_playback_info(HARDWARE_GET).unwrap(), VolumeState::new(48, true));
    }

    #[test]
    fn test_mono_control() {
        let output = "Simple mixer control 'Speaker',0\n  Mono: Playback 31 [100%] [0.00dB] [on]\n";
        assert_eq!(parse_playback_info(output).unwrap(), VolumeState::new(100, false));
    }

    #[test]
    fn test_playback_missing() {
        let output = "Simple mixer control 'Capture',0\n  Front Left: Capture 10 [20%] [on]\n";
        assert_matches!(parse_playback_info(output), Err(BackendError::Parse(_)));
    }
}
