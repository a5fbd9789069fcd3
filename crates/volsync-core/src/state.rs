//! Volume state snapshots and partial-state deltas.

use serde::{Deserialize, Serialize};

/// Highest volume percentage.
pub const MAX_VOLUME: u8 = 100;

/// Snapshot of the host output volume and mute flag.
///
/// Serialized as `{"volume": 42, "muted": false}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeState {
    /// Volume percentage, always in `0..=100`
    pub volume: u8,
    /// Whether output is muted
    pub muted: bool,
}

impl VolumeState {
    /// Build a snapshot, clamping `volume` into `0..=100`.
    #[must_use]
    pub fn new(volume: i64, muted: bool) -> Self {
        Self { volume: clamp_volume(volume), muted }
    }

    /// Changes from `previous` to `self`, one delta per field that moved.
    ///
    /// Volume comes before mute when both changed.
    #[must_use]
    pub fn deltas_since(&self, previous: &Self) -> Vec<StateDelta> {
        let mut deltas = Vec::with_capacity(2);
        if self.volume != previous.volume {
            deltas.push(StateDelta::Volume(self.volume));
        }
        if self.muted != previous.muted {
            deltas.push(StateDelta::Muted(self.muted));
        }
        deltas
    }
}

impl Default for VolumeState {
    fn default() -> Self {
        Self { volume: 50, muted: false }
    }
}

/// Clamp an arbitrary integer into the `0..=100` volume range.
#[must_use]
pub fn clamp_volume(value: i64) -> u8 {
    u8::try_from(value.clamp(0, i64::from(MAX_VOLUME))).unwrap_or(MAX_VOLUME)
}

/// A single changed field, pushed to clients by the state monitor.
///
/// Serialized as `{"volume": 55}` or `{"muted": true}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateDelta {
    Volume(u8),
    Muted(bool),
}
