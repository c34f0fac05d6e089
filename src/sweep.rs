use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::db::store::TelemetryStore;

/// Flips devices to inactive once they have been quiet for longer than the
/// configured window. Ingestion only ever marks devices active; this task
/// is the other half of presence.
pub struct PresenceSweep<S> {
    store: S,
    interval: Duration,
    offline_after: chrono::Duration,
}

impl<S: TelemetryStore> PresenceSweep<S> {
    pub fn new(store: S, interval_secs: u64, offline_after_secs: u64) -> Self {
        Self {
            store,
            interval: Duration::from_secs(interval_secs),
            offline_after: chrono::Duration::seconds(offline_after_secs as i64),
        }
    }

    /// Runs until cancelled. Spawn this via `tokio::spawn`.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Presence sweep started");
        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Presence sweep stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.run_once().await {
                error!(error = %e, "Presence sweep iteration failed");
            }
        }
    }

    async fn run_once(&self) -> anyhow::Result<()> {
        let cutoff = Utc::now() - self.offline_after;
        let marked = self.store.mark_stale_inactive(cutoff).await?;
        if marked > 0 {
            info!(marked, "Marked stale devices inactive");
        }
        Ok(())
    }
}
