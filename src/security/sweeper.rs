//! Background eviction of idle admission windows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::observability::metrics;
use crate::security::admission::AdmissionController;
use crate::security::clock::Clock;

/// Periodically drops keys whose window has been empty for `retention`.
pub struct IdleSweeper {
    controller: Arc<AdmissionController>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    retention: Duration,
}

impl IdleSweeper {
    pub fn new(
        controller: Arc<AdmissionController>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        retention: Duration,
    ) -> Self {
        Self {
            controller,
            clock,
            interval,
            retention,
        }
    }

    /// Run one sweep and report it.
    pub fn sweep_once(&self) -> usize {
        let evicted = self.controller.sweep(self.clock.now(), self.retention);
        let remaining = self.controller.tracked_keys();
        if evicted > 0 {
            tracing::debug!(evicted, remaining, "Evicted idle rate limit windows");
        }
        metrics::record_evicted(evicted);
        metrics::record_tracked_keys(remaining);
        evicted
    }

    /// Sweep every `interval` until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing to evict yet.
        ticker.tick().await;

        tracing::info!(
            interval = ?self.interval,
            retention = ?self.retention,
            "Idle sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Idle sweeper stopped");
                    break;
                }
            }
        }
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
