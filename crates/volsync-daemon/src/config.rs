//! Daemon configuration file.
//!
//! The file holds the JSON configuration snapshot. The daemon only reads it;
//! writing it is left to whatever tool edits the settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::info;

use volsync_core::ConfigSnapshot;

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "VOLSYNC_CONFIG";

/// Load configuration from the default location or defaults.
pub fn load_config() -> Result<ConfigSnapshot> {
    load_config_from(&config_path()?)
}

/// Load configuration from `path`, using defaults if the file is missing.
pub fn load_config_from(path: &Path) -> Result<ConfigSnapshot> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        let config = ConfigSnapshot::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {path:?}"))?;
        info!(?path, "Configuration loaded");
        Ok(config)
    } else {
        info!(?path, "Config file not found, using defaults");
        Ok(ConfigSnapshot::default())
    }
}

/// Get the configuration file path.
fn config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    let dirs = ProjectDirs::from("com", "volsync", "Volsync")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.json"))
}
