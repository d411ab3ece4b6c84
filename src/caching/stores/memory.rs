//! # In-Memory Cache Store
//!
//! A process-local [`CacheStore`] backed by `DashMap`. Entries carry an absolute expiry and are
//! dropped lazily on read plus by a periodic sweep. Key enumeration uses the same glob syntax as
//! Redis `SCAN MATCH`, so invalidation patterns behave identically on both backends.
//!
//! The store can be told to behave as if it were unreachable (`set_available(false)`) or as if
//! its operations had started failing (`set_failing(true)`). An injected failure degrades the
//! store on the first operation that hits it, the way a Redis error does, and clearing the
//! switch counts as a reconnect. Both are used by tests that exercise the degradation paths.

use super::{glob_match, CacheStore};
use crate::caching::health::CacheHealth;
use crate::caching::{CacheError, CacheResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    /// `None` when the TTL is too large to represent
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(expires_at) if now >= expires_at)
    }
}

/// In-memory cache implementation
pub struct InMemoryCache {
    entries: Arc<DashMap<String, MemoryEntry>>,
    health: CacheHealth,
    failing: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryCache {
    /// Create an empty store that is immediately ready
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            health: CacheHealth::ready(),
            failing: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Spawn a background sweep removing expired entries every `interval`.
    ///
    /// The task ends once the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let entries = Arc::downgrade(&self.entries);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                let now = Instant::now();
                let before = entries.len();
                entries.retain(|_, entry| !entry.is_expired(now));
                let removed = before.saturating_sub(entries.len());
                if removed > 0 {
                    debug!("Swept {} expired cache entries", removed);
                }
            }
        })
    }

    /// Simulate the store becoming unreachable or reachable again
    pub fn set_available(&self, available: bool) {
        if available {
            self.health.mark_ready();
        } else {
            self.health.mark_degraded("in-memory store marked unavailable");
        }
    }

    /// Make operations fail; the store degrades on the first failed call.
    ///
    /// Switching failures off again marks the store ready.
    pub fn set_failing(&self, failing: bool) {
        let was_failing = self.failing.swap(failing, Ordering::SeqCst);
        if was_failing && !failing && !self.health.is_ready() {
            self.health.mark_ready();
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    /// Whether the store holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total successful `set` calls, for tests asserting write behavior
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Remaining TTL of a key, if present; `Duration::MAX` for an entry that never expires
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.entries.get(key)?;
        match entry.expires_at {
            Some(expires_at) => expires_at.checked_duration_since(Instant::now()),
            None => Some(Duration::MAX),
        }
    }

    fn check_operational(&self) -> CacheResult<()> {
        if !self.health.is_ready() {
            return Err(CacheError::Unavailable);
        }
        if self.failing.load(Ordering::SeqCst) {
            self.health.mark_degraded("injected in-memory store failure");
            return Err(CacheError::store("injected in-memory store failure"));
        }
        Ok(())
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check_operational()?;

        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }

        // Expired or absent; drop a stale entry if there was one
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.check_operational()?;

        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_vec(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.check_operational()?;

        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now) && glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        self.check_operational()?;

        let now = Instant::now();
        let mut deleted = 0;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(key) {
                if !entry.is_expired(now) {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(self.health.is_ready() && !self.failing.load(Ordering::SeqCst))
    }

    fn health(&self) -> &CacheHealth {
        &self.health
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
