//! Periodic eviction sweep scheduling.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::registry::EvictionRegistry;

/// Default interval between eviction sweeps.
///
/// Deliberately coarse relative to typical limiter windows: the sweep exists
/// to bound memory under abandoned-key churn, not to reclaim entries with
/// per-window precision. Expired entries from short-window limiters may sit
/// in memory until the next pass.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Recurring background task that evicts expired entries across every
/// limiter registered with an [`EvictionRegistry`].
///
/// Nothing awaits the sweep; its only observable effect is reclaimed memory.
pub struct Sweeper {
    registry: Arc<EvictionRegistry>,
    interval: Duration,
}

impl Sweeper {
    /// Create a sweeper with the default interval.
    pub fn new(registry: Arc<EvictionRegistry>) -> Self {
        Self::with_interval(registry, DEFAULT_SWEEP_INTERVAL)
    }

    /// Create a sweeper with a custom interval.
    pub fn with_interval(registry: Arc<EvictionRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Spawn the recurring sweep task.
    ///
    /// The task runs until the handle shuts it down or the runtime stops.
    /// It is detached: it never keeps the embedding process alive on its
    /// own, so no explicit teardown is required before exit.
    pub fn spawn(self) -> SweeperHandle {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting eviction sweeper"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first
            // sweep lands one full interval after startup.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = self.registry.sweep();
                if removed > 0 {
                    debug!(removed = removed, "Eviction sweep removed expired entries");
                }
            }
        });

        SweeperHandle { task }
    }
}

/// Handle to a running sweeper task.
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep task.
    pub fn shutdown(self) {
        self.task.abort();
    }
}
