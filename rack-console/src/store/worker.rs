//! RefreshWorker - keeps the DataStore fresh
//!
//! - change events: debounced refresh (each event restarts the quiet window)
//! - stale check: periodic refresh once the data is older than `STALE_AFTER`
//! - after an applied refresh, pending placeholder records are replayed

use rack_client::ChangeEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use super::{DataStore, RefreshOutcome};

/// Quiet interval before a burst of change events triggers one refresh
pub const REFRESH_DEBOUNCE: Duration = Duration::from_secs(1);

pub const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Data older than this is refreshed on the next stale check
pub const STALE_AFTER: Duration = Duration::from_secs(5 * 60);

pub struct RefreshWorker {
    store: Arc<DataStore>,
    changes: broadcast::Receiver<ChangeEvent>,
    debounce: Duration,
}

impl RefreshWorker {
    /// Subscribes to the change feed immediately
    pub fn new(store: Arc<DataStore>) -> Self {
        let changes = store.backend().subscribe_changes();
        Self {
            store,
            changes,
            debounce: REFRESH_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub async fn run(mut self) {
        let shutdown = self.store.shutdown_token().clone();
        tracing::info!("Refresh worker started");

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = self.refresh_once() => {}
        }

        let mut stale_check = tokio::time::interval(STALE_CHECK_INTERVAL);
        stale_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        stale_check.tick().await; // skip first immediate tick

        let mut debounce_deadline: Option<Instant> = None;
        let mut feed_open = true;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Refresh worker shutting down");
                    break;
                }

                result = self.changes.recv(), if feed_open => {
                    match result {
                        Ok(event) => {
                            tracing::debug!(table = %event.table, kind = ?event.kind, "Change event");
                            debounce_deadline = Some(Instant::now() + self.debounce);
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("Change feed lagged {n} events, scheduling refresh");
                            debounce_deadline = Some(Instant::now() + self.debounce);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Change feed closed");
                            feed_open = false;
                        }
                    }
                }

                _ = async {
                    match debounce_deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                }, if debounce_deadline.is_some() => {
                    debounce_deadline = None;
                    self.refresh_once().await;
                }

                _ = stale_check.tick() => {
                    if self.store.is_stale() {
                        tracing::debug!("Catalog is stale, refreshing");
                        self.refresh_once().await;
                    }
                }
            }
        }
    }

    async fn refresh_once(&self) {
        match self.store.refresh().await {
            Ok(RefreshOutcome::Applied) => {
                if self.store.pending_count() > 0 {
                    self.store.flush_pending().await;
                }
            }
            Ok(RefreshOutcome::Superseded) => {}
            // Already logged by the store
            Err(_) => {}
        }
    }
}
