//! Expiry Cleanup Task
//!
//! Background task that periodically sweeps expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::CacheStore;

/// Spawns a background task that periodically runs [`CacheStore::cleanup`].
///
/// Each sweep scans every key, so it runs on the blocking pool. A failed
/// sweep is logged and the task carries on with the next interval.
///
/// Returns a JoinHandle that can be aborted during graceful shutdown.
pub fn spawn_cleanup_task(cache: Arc<CacheStore>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let cache = Arc::clone(&cache);
            match tokio::task::spawn_blocking(move || cache.cleanup()).await {
                Ok(Ok(removed)) if removed > 0 => {
                    info!("Expiry cleanup: removed {} expired entries", removed)
                }
                Ok(Ok(_)) => debug!("Expiry cleanup: no expired entries found"),
                Ok(Err(e)) => error!(error = %e, "Expiry cleanup failed"),
                Err(e) => error!(error = %e, "Expiry cleanup task panicked"),
            }
        }
    })
}
