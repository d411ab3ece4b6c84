//! # Cache Health
//!
//! Tracks whether the cache store can currently be used. Stores flip the state when an
//! operation fails or a reconnect succeeds; the interceptor and the invalidator read it before
//! touching the store and fall straight through when it is not ready.
//!
//! Transitions are published on a `tokio::sync::watch` channel so the Redis supervisor can
//! sleep until something goes wrong instead of polling.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{info, warn};

/// Connectivity state of a cache store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// Initial connection has not completed yet
    Connecting,
    /// Store is reachable and operations succeed
    Ready,
    /// Store is unreachable or an operation failed; cache is bypassed
    Degraded,
}

/// Point-in-time view of the health state, suitable for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub state: Readiness,
    pub ready: bool,
    pub last_error: Option<String>,
    pub degraded_transitions: u64,
    pub recoveries: u64,
}

/// Shared health state of one cache store
///
/// Cloning is cheap and all clones observe the same state.
#[derive(Clone)]
pub struct CacheHealth {
    inner: Arc<HealthInner>,
}

struct HealthInner {
    ready: AtomicBool,
    state: watch::Sender<Readiness>,
    last_error: Mutex<Option<String>>,
    degraded_transitions: AtomicU64,
    recoveries: AtomicU64,
}

impl CacheHealth {
    /// Create a health tracker in the `Connecting` state
    pub fn new() -> Self {
        Self::with_state(Readiness::Connecting)
    }

    /// Create a health tracker that starts ready (in-process stores)
    pub fn ready() -> Self {
        Self::with_state(Readiness::Ready)
    }

    fn with_state(initial: Readiness) -> Self {
        let (state, _) = watch::channel(initial);
        metrics::gauge!("cache_ready").set(if initial == Readiness::Ready { 1.0 } else { 0.0 });
        Self {
            inner: Arc::new(HealthInner {
                ready: AtomicBool::new(initial == Readiness::Ready),
                state,
                last_error: Mutex::new(None),
                degraded_transitions: AtomicU64::new(0),
                recoveries: AtomicU64::new(0),
            }),
        }
    }

    /// Whether cache operations should be attempted
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Current state
    pub fn state(&self) -> Readiness {
        *self.inner.state.borrow()
    }

    /// Record a successful (re)connection
    pub fn mark_ready(&self) {
        let previous = self.inner.state.send_replace(Readiness::Ready);
        self.inner.ready.store(true, Ordering::Release);
        metrics::gauge!("cache_ready").set(1.0);

        match previous {
            Readiness::Ready => {}
            Readiness::Connecting => info!("✅ Cache store ready"),
            Readiness::Degraded => {
                self.inner.recoveries.fetch_add(1, Ordering::Relaxed);
                info!("✅ Cache store recovered, leaving degraded mode");
            }
        }
    }

    /// Record a failure; the cache is bypassed until `mark_ready` is called
    pub fn mark_degraded(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if let Ok(mut last_error) = self.inner.last_error.lock() {
            *last_error = Some(reason.clone());
        }

        self.inner.ready.store(false, Ordering::Release);
        let previous = self.inner.state.send_replace(Readiness::Degraded);
        metrics::gauge!("cache_ready").set(0.0);

        if previous != Readiness::Degraded {
            self.inner.degraded_transitions.fetch_add(1, Ordering::Relaxed);
            warn!(reason = %reason, "⚠️  Cache store degraded, bypassing cache");
        }
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.inner.state.subscribe()
    }

    /// Snapshot for health endpoints
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            state: self.state(),
            ready: self.is_ready(),
            last_error: self
                .inner
                .last_error
                .lock()
                .ok()
                .and_then(|guard| guard.clone()),
            degraded_transitions: self.inner.degraded_transitions.load(Ordering::Relaxed),
            recoveries: self.inner.recoveries.load(Ordering::Relaxed),
        }
    }
}

impl Default for CacheHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHealth")
            .field("state", &self.state())
            .finish()
    }
}
