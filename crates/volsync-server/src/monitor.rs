//! Polling state monitor.
//!
//! Samples the volume controller on a fixed period and broadcasts one
//! partial-state delta per field that changed since the previous sample.
//! Changes that revert between two samples are not observed.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use volsync_core::{PollingConfig, StateDelta, VolumeController, VolumeState};

/// Last state seen by the monitor, used to compute deltas.
///
/// Starts unknown, so the first observation never produces a delta.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    last: Option<VolumeState>,
}

impl DeltaTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed state, if any.
    #[must_use]
    pub fn last(&self) -> Option<VolumeState> {
        self.last
    }

    /// Record `current` and return the deltas against the previous state.
    pub fn observe(&mut self, current: VolumeState) -> Vec<StateDelta> {
        let deltas = match self.last {
            Some(previous) => current.deltas_since(&previous),
            None => Vec::new(),
        };
        self.last = Some(current);
        deltas
    }
}

/// Background task sampling the backend for external changes.
///
/// A disabled monitor spawns nothing. Dropping the monitor stops the task.
pub struct StateMonitor {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StateMonitor {
    /// Start sampling according to `polling`, sending deltas on `deltas`.
    #[must_use]
    pub fn start(
        controller: VolumeController,
        polling: PollingConfig,
        deltas: broadcast::Sender<StateDelta>,
    ) -> Self {
        let cancel = CancellationToken::new();

        if !polling.enabled {
            info!("State polling disabled");
            return Self { cancel, task: None };
        }

        info!(interval_ms = polling.interval_ms, "Starting state monitor");
        let task = tokio::spawn(run(controller, polling.interval(), deltas, cancel.clone()));
        Self { cancel, task: Some(task) }
    }

    /// Whether a sampling task is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop sampling and wait for the task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "State monitor task failed");
        }
        debug!("State monitor stopped");
    }
}

impl Drop for StateMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    controller: VolumeController,
    period: Duration,
    deltas: broadcast::Sender<StateDelta>,
    cancel: CancellationToken,
) {
    let mut tracker = DeltaTracker::new();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sample = tokio::select! {
            () = cancel.cancelled() => break,
            sample = controller.get_state() => sample,
        };

        match sample {
            Ok(state) => {
                for delta in tracker.observe(state) {
                    debug!(?delta, "External state change");
                    // No receivers just means no clients are connected
                    let _ = deltas.send(delta);
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to sample volume state");
            }
        }
    }
}
