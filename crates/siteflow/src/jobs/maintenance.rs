use std::sync::Arc;
use std::time::Duration;

use crate::jobs::store::JobStore;

/// Periodically removes expired job records. Runs until the task is dropped.
pub async fn run_sweeper(store: Arc<dyn JobStore>, interval: Duration) {
    loop {
        match store.purge_expired().await {
            Ok(n) if n > 0 => tracing::info!(purged = n, "removed expired job records"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "job sweep failed"),
        }

        tokio::time::sleep(interval).await;
    }
}
