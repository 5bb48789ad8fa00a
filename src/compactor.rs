use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::store::WalStore;

/// Start [`run_compactor`] with the thresholds from `config`.
pub fn spawn_compactor(store: &Arc<WalStore>, config: &Config) -> JoinHandle<()> {
    tokio::spawn(run_compactor(
        Arc::downgrade(store),
        config.compact_threshold,
        config.compact_interval,
    ))
}

/// Background task that compacts the WAL once `threshold` appends have
/// piled up since the last compaction. First check is one `every` after
/// start. Stops once the store is dropped.
pub async fn run_compactor(store: Weak<WalStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    loop {
        interval.tick().await;
        let Some(store) = store.upgrade() else {
            debug!("store dropped, compactor exiting");
            return;
        };
        compact_if_due(&store, threshold).await;
    }
}

/// One compactor pass. Returns true when a compaction ran.
pub async fn compact_if_due(store: &WalStore, threshold: u64) -> bool {
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact().await {
        Ok(records) => {
            metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
            info!("compacted WAL: {appends} appends folded into {records} records");
            true
        }
        Err(e) => {
            warn!("WAL compaction failed: {e}");
            false
        }
    }
}
