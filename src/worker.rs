// Background refresh worker: periodic refresh of all four kinds while serving.
// Each tick publishes InventoryEvents through the inventory's broadcast channel.

use crate::inventory::Inventory;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;
use tokio::time::{Duration, interval};
use tracing::Instrument;

/// Inventory, connection counter, and shutdown for the worker.
pub struct WorkerDeps {
    pub inventory: Arc<Inventory>,
    pub ws_event_connections: Arc<AtomicUsize>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Worker timing config (real seconds).
pub struct WorkerConfig {
    pub refresh_interval_secs: u64,
    /// How often to log app stats.
    pub stats_log_interval_secs: u64,
}

pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        inventory,
        ws_event_connections,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        refresh_interval_secs,
        stats_log_interval_secs,
    } = config;

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(refresh_interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // Skip the immediate first tick.
        stats_log_tick.tick().await;

        let mut refreshes_total: u64 = 0;
        let mut refresh_failures_total: u64 = 0;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let report = inventory.refresh_all().await;
                    refreshes_total += 1;
                    for (kind, error) in report.iter().filter_map(|e| Some((e.kind, e.error.as_ref()?))) {
                        refresh_failures_total += 1;
                        tracing::debug!(
                            operation = "refresh_all",
                            kind = %kind,
                            error = %error,
                            "kind refresh failed"
                        );
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        ws_event_clients = ws_event_connections.load(Ordering::Relaxed),
                        event_subscribers = inventory.receiver_count(),
                        refreshes_total,
                        refresh_failures_total,
                        "app stats"
                    );
                }
            }
        }
    }
    .instrument(tracing::debug_span!("worker", refresh_interval_secs)))
}
