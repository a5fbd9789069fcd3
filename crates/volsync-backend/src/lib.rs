//! Volsync backends - system volume control for each supported OS.
//!
//! Every backend drives an external program and parses its output:
//! `amixer` on Linux, `osascript` on macOS and a small helper executable on
//! Windows. All of them are compiled everywhere so their parsers can be
//! tested on any host; [`system_backend`] picks the one for the running OS.

pub mod alsa;
pub mod macos;
pub mod process;
pub mod windows;

use std::sync::Arc;
use std::time::Duration;

use volsync_core::{AudioBackend, BackendResult};

pub use alsa::AlsaBackend;
pub use macos::OsaScriptBackend;
pub use windows::HelperExeBackend;

/// Longest time a single backend call may take.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Select the backend for the operating system this binary was built for.
///
/// # Errors
/// Returns an error on unsupported platforms, or when the Windows helper
/// executable cannot be located.
pub fn system_backend() -> BackendResult<Arc<dyn AudioBackend>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(AlsaBackend::new(DEFAULT_CALL_TIMEOUT)))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(OsaScriptBackend::new(DEFAULT_CALL_TIMEOUT)))
    }

    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(HelperExeBackend::beside_current_exe(DEFAULT_CALL_TIMEOUT)?))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Err(volsync_core::BackendError::Unsupported(std::env::consts::OS.to_string()))
    }
}
