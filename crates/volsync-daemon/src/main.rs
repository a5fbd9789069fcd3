//! Volsync Daemon - WebSocket system volume control service.
//!
//! Loads the configuration, selects the audio backend for this platform and
//! runs the control server until asked to stop. SIGHUP re-reads the
//! configuration and rebuilds the server.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod signals;

use volsync_core::{AudioBackend, ConfigSnapshot, MemoryBackend, VolumeController, VolumeState};
use volsync_server::LifecycleManager;

use signals::SignalEvent;

/// Environment variable selecting the backend; `memory` runs without audio.
const BACKEND_ENV: &str = "VOLSYNC_BACKEND";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("volsync=info".parse()?)
                .add_directive("volsync_daemon=debug".parse()?)
                .add_directive("volsync_server=debug".parse()?),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Volsync daemon");

    let config = config::load_config().unwrap_or_else(|e| {
        error!(error = ?e, "Failed to load configuration, using defaults");
        ConfigSnapshot::default()
    });

    let backend = select_backend().context("Failed to initialize audio backend")?;
    info!(backend = backend.name(), "Audio backend ready");

    let controller = VolumeController::new(backend);
    let manager = LifecycleManager::new(controller, config);

    // A bind failure is not fatal: a reload with a workable port recovers
    match manager.start().await {
        Ok(addr) => info!(%addr, "WebSocket server is running"),
        Err(e) => error!(error = %e, "Control server not started"),
    }

    let mut signal_rx = signals::setup_signal_handlers()?;

    while let Some(event) = signal_rx.recv().await {
        match event {
            SignalEvent::Reload => reload(&manager).await,
            SignalEvent::Shutdown => break,
        }
    }

    info!("Shutting down...");
    manager.shutdown().await;
    info!("Volsync daemon stopped");

    Ok(())
}

fn select_backend() -> Result<Arc<dyn AudioBackend>> {
    match std::env::var(BACKEND_ENV).ok().as_deref() {
        Some("memory") => {
            warn!("Using in-memory backend; system volume is not touched");
            Ok(Arc::new(MemoryBackend::new(VolumeState::default())))
        }
        Some(other) if !other.is_empty() && other != "system" => {
            anyhow::bail!("Unknown backend {other:?} in {BACKEND_ENV}")
        }
        _ => Ok(volsync_backend::system_backend()?),
    }
}

async fn reload(manager: &LifecycleManager) {
    info!("Reloading configuration");
    let next = match config::load_config() {
        Ok(next) => next,
        Err(e) => {
            error!(error = ?e, "Failed to reload configuration, keeping current one");
            return;
        }
    };

    match manager.apply(next).await {
        Ok(addr) => info!(%addr, "WebSocket server restarted"),
        Err(e) => error!(error = %e, "Failed to apply configuration"),
    }
}
