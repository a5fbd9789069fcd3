//! Signal handling for shutdown and configuration reload.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;

/// What a received signal asks the daemon to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// Re-read the configuration file and rebuild the server
    Reload,
    /// Stop the daemon
    Shutdown,
}

/// Set up signal handlers.
///
/// SIGHUP requests a reload; SIGTERM and SIGINT request shutdown.
#[cfg(unix)]
pub fn setup_signal_handlers() -> Result<mpsc::Receiver<SignalEvent>> {
    use futures::StreamExt;
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    let (tx, rx) = mpsc::channel(4);
    let mut signals = Signals::new([SIGHUP, SIGINT, SIGTERM])?;

    tokio::spawn(async move {
        while let Some(signal) = signals.next().await {
            let event = match signal {
                SIGHUP => {
                    info!("Received SIGHUP");
                    SignalEvent::Reload
                }
                SIGTERM => {
                    info!("Received SIGTERM");
                    SignalEvent::Shutdown
                }
                _ => {
                    info!("Received SIGINT");
                    SignalEvent::Shutdown
                }
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

/// Set up signal handlers.
///
/// Only Ctrl+C is handled here; it requests shutdown.
#[cfg(not(unix))]
pub fn setup_signal_handlers() -> Result<mpsc::Receiver<SignalEvent>> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
            let _ = tx.send(SignalEvent::Shutdown).await;
        }
    });

    Ok(rx)
}
