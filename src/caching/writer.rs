//! Detached cache writes.
//!
//! Populating the cache never delays the response: the interceptor hands the captured payload
//! to a [`CacheWriter`], which persists it on a tracked background task. Tracking lets tests
//! wait for outstanding writes and lets shutdown drain them before the store is closed.

use super::key_generator::CacheKey;
use super::stores::CacheStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Spawns and tracks fire-and-forget cache writes
#[derive(Clone, Default)]
pub struct CacheWriter {
    tracker: TaskTracker,
}

impl CacheWriter {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Persist `payload` under `key` in the background.
    ///
    /// Failures are logged and counted, never surfaced.
    pub fn spawn_write(
        &self,
        store: Arc<dyn CacheStore>,
        key: CacheKey,
        payload: Vec<u8>,
        ttl: Duration,
    ) {
        self.tracker.spawn(async move {
            match store.set(key.as_str(), &payload, ttl).await {
                Ok(()) => {
                    metrics::counter!("cache_writes_total", "outcome" => "stored").increment(1);
                    debug!(key = %key, bytes = payload.len(), ttl_secs = ttl.as_secs(), "Cached response");
                }
                Err(e) => {
                    metrics::counter!("cache_writes_total", "outcome" => "failed").increment(1);
                    warn!(key = %key, error = %e, "Failed to cache response");
                }
            }
        });
    }

    /// Number of writes still in flight
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every write spawned so far has finished
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Flush with an upper bound; returns false if writes were still running at the deadline
    pub async fn drain(&self, timeout: Duration) -> bool {
        let pending = self.pending();
        if pending > 0 {
            debug!("Draining {} pending cache writes", pending);
        }
        match tokio::time::timeout(timeout, self.flush()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "⏰ Gave up on {} cache writes after {:?}",
                    self.pending(),
                    timeout
                );
                false
            }
        }
    }
}
