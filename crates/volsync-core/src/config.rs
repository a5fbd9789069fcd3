//! Configuration snapshot consumed by the control server and state monitor.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Immutable configuration, replaced wholesale on every change.
///
/// Wire shape:
/// ```json
/// { "websocket": { "port": 8080 },
///   "runOnStartup": true,
///   "polling": { "enabled": false, "interval": 1000 },
///   "version": "0.1.0" }
/// ```
///
/// Older files kept the auto-launch flag at `websocket.runOnStartup`; it is
/// read from there when the top-level field is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ConfigFile")]
pub struct ConfigSnapshot {
    /// WebSocket listener settings
    pub websocket: WebSocketConfig,
    /// Whether the host should launch the daemon at login
    pub run_on_startup: bool,
    /// State monitor settings
    pub polling: PollingConfig,
    /// Configuration format version
    pub version: String,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            websocket: WebSocketConfig::default(),
            run_on_startup: true,
            polling: PollingConfig::default(),
            version: default_version(),
        }
    }
}

impl ConfigSnapshot {
    /// Parse a snapshot from JSON, applying defaults for missing fields.
    ///
    /// # Errors
    /// Returns an error if the text is not valid JSON for this shape.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Check the invariants the server relies on.
    ///
    /// # Errors
    /// Returns an error for a zero port or a zero polling interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.websocket.port == 0 {
            return Err(ConfigError::InvalidPort(self.websocket.port));
        }
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::InvalidInterval(self.polling.interval_ms));
        }
        Ok(())
    }

    /// Address the control server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.websocket.host, self.websocket.port)
    }
}

/// On-disk layout, including the legacy flag location.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    websocket: WebSocketFile,
    run_on_startup: Option<bool>,
    #[serde(default)]
    polling: PollingConfig,
    #[serde(default = "default_version")]
    version: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebSocketFile {
    #[serde(flatten)]
    listener: WebSocketConfig,
    run_on_startup: Option<bool>,
}

impl From<ConfigFile> for ConfigSnapshot {
    fn from(file: ConfigFile) -> Self {
        Self {
            websocket: file.websocket.listener,
            run_on_startup: file.run_on_startup.or(file.websocket.run_on_startup).unwrap_or(true),
            polling: file.polling,
            version: file.version,
        }
    }
}

/// WebSocket listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketConfig {
    /// TCP port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interface to bind, all interfaces by default
    #[serde(default = "default_host")]
    pub host: IpAddr,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self { port: default_port(), host: default_host() }
    }
}

/// State monitor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Whether the backend is sampled for external changes
    #[serde(default)]
    pub enabled: bool,
    /// Sampling period in milliseconds
    #[serde(rename = "interval", default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { enabled: false, interval_ms: default_interval_ms() }
    }
}

impl PollingConfig {
    /// Sampling period.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
