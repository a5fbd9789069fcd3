//! Lifecycle of the control server and state monitor.
//!
//! The manager owns the active configuration snapshot and the running
//! (server, monitor) pair. A new snapshot replaces the old one wholesale and
//! triggers a sequenced rebuild: close clients, release the port, bind the
//! new port, restart the monitor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, broadcast};
use tracing::{error, info};

use volsync_core::{ConfigSnapshot, VolumeController};

use crate::error::LifecycleError;
use crate::monitor::StateMonitor;
use crate::server::ControlServer;

/// Default bound on waiting for an old server to release its port.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Capacity of the per-server delta broadcast channel.
const DELTA_CHANNEL_CAPACITY: usize = 64;

/// Running server and monitor built from one snapshot.
struct ActiveServices {
    server: ControlServer,
    monitor: StateMonitor,
}

/// Owns the active configuration and the services built from it.
pub struct LifecycleManager {
    controller: VolumeController,
    config: ArcSwap<ConfigSnapshot>,
    active: Mutex<Option<ActiveServices>>,
    shutdown_grace: Duration,
}

impl LifecycleManager {
    /// Create a manager; nothing runs until [`LifecycleManager::start`].
    #[must_use]
    pub fn new(controller: VolumeController, config: ConfigSnapshot) -> Self {
        Self {
            controller,
            config: ArcSwap::from_pointee(config),
            active: Mutex::new(None),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Override how long teardown waits before forcing the port closed.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Active configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<ConfigSnapshot> {
        self.config.load_full()
    }

    /// Build services from the current snapshot.
    ///
    /// # Errors
    /// Returns an error if the snapshot is invalid or the port cannot be bound.
    pub async fn start(&self) -> Result<SocketAddr, LifecycleError> {
        let current = ConfigSnapshot::clone(&self.config());
        self.apply(current).await
    }

    /// Replace the configuration and rebuild the server and monitor.
    ///
    /// An invalid snapshot is rejected before anything is torn down. A bind
    /// failure leaves no server running until a workable snapshot is applied.
    ///
    /// # Errors
    /// Returns an error if the snapshot is invalid or the port cannot be bound.
    pub async fn apply(&self, next: ConfigSnapshot) -> Result<SocketAddr, LifecycleError> {
        if let Err(e) = next.validate() {
            error!(error = %e, "Rejecting configuration");
            return Err(e.into());
        }

        let mut active = self.active.lock().await;
        if let Some(services) = active.take() {
            self.teardown(services).await;
        }

        let next = Arc::new(next);
        self.config.store(Arc::clone(&next));

        info!(
            port = next.websocket.port,
            polling = next.polling.enabled,
            interval_ms = next.polling.interval_ms,
            run_on_startup = next.run_on_startup,
            version = %next.version,
            "Applying configuration"
        );

        let (delta_tx, _) = broadcast::channel(DELTA_CHANNEL_CAPACITY);
        let server = match ControlServer::bind(
            next.bind_addr(),
            self.controller.clone(),
            delta_tx.clone(),
            next.polling.enabled,
        )
        .await
        {
            Ok(server) => server,
            Err(e) => {
                error!(error = %e, "Control server failed to start; waiting for a new configuration");
                return Err(e.into());
            }
        };

        let monitor = StateMonitor::start(self.controller.clone(), next.polling, delta_tx);
        let addr = server.local_addr();
        *active = Some(ActiveServices { server, monitor });

        Ok(addr)
    }

    /// Stop everything.
    pub async fn shutdown(&self) {
        if let Some(services) = self.active.lock().await.take() {
            self.teardown(services).await;
        }
    }

    /// Address of the running server, if any.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.active.lock().await.as_ref().map(|services| services.server.local_addr())
    }

    /// Whether a server is currently running.
    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Number of clients connected to the running server.
    pub async fn connection_count(&self) -> usize {
        self.active.lock().await.as_ref().map_or(0, |services| services.server.connection_count())
    }

    async fn teardown(&self, services: ActiveServices) {
        let ActiveServices { server, monitor } = services;
        info!(local_addr = %server.local_addr(), "Tearing down control server");
        server.shutdown(self.shutdown_grace).await;
        monitor.stop().await;
    }
}
