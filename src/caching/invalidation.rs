//! # Cache Invalidation Module
//!
//! Deletes cached responses after a successful write. Every mutation names the resource family
//! it touched and the tenant it belongs to; the [`Invalidator`] turns that into glob patterns
//! built by the same [`KeyGenerator`] the read interceptor uses, so a pattern always lines up
//! with the keys a reader of that family could have produced.
//!
//! Families whose cached views embed rows of another family are listed as dependents: a
//! category rename changes the `category_name` carried in menu listings, so category writes
//! also clear the menu family for the same tenant.
//!
//! Invalidation is best effort. A degraded store is skipped and a failed delete is logged and
//! reported as zero removed keys; callers never see an error. A skipped invalidation is
//! remembered, and once the store reports ready again the recovery watch clears the whole
//! namespace, since entries written before the outage may describe rows changed during it.

use super::health::Readiness;
use super::key_generator::{InvalidationPattern, KeyGenerator};
use super::stores::CacheStore;
use super::CacheResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Mutable resource families with cached read views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFamily {
    Categories,
    Menu,
    Restaurant,
}

impl ResourceFamily {
    pub const ALL: [ResourceFamily; 3] = [
        ResourceFamily::Categories,
        ResourceFamily::Menu,
        ResourceFamily::Restaurant,
    ];

    /// Path of the cached read route (a path prefix for `Restaurant`)
    pub fn read_path(&self) -> &'static str {
        match self {
            ResourceFamily::Categories => "/api/categories/public",
            ResourceFamily::Menu => "/api/menu/public",
            ResourceFamily::Restaurant => "/api/restaurants/by-slug/",
        }
    }

    /// Whether cached views are scoped by the tenant selector
    pub fn is_selector_scoped(&self) -> bool {
        !matches!(self, ResourceFamily::Restaurant)
    }

    /// Families whose cached views embed rows of this one
    pub fn dependents(&self) -> &'static [ResourceFamily] {
        match self {
            ResourceFamily::Categories => &[ResourceFamily::Menu],
            ResourceFamily::Menu => &[],
            ResourceFamily::Restaurant => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceFamily::Categories => "categories",
            ResourceFamily::Menu => "menu",
            ResourceFamily::Restaurant => "restaurant",
        }
    }
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "categories" | "category" => Ok(ResourceFamily::Categories),
            "menu" | "menu_items" => Ok(ResourceFamily::Menu),
            "restaurant" | "restaurants" => Ok(ResourceFamily::Restaurant),
            other => Err(format!("unknown resource family '{}'", other)),
        }
    }
}

/// What a single invalidation call covered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidationTarget {
    Prefix {
        prefix: String,
    },
    Family {
        family: ResourceFamily,
        selector: Option<String>,
    },
    All,
}

impl fmt::Display for InvalidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationTarget::Prefix { prefix } => write!(f, "prefix {}", prefix),
            InvalidationTarget::Family {
                family,
                selector: Some(selector),
            } => write!(f, "{} for {}", family, selector),
            InvalidationTarget::Family {
                family,
                selector: None,
            } => write!(f, "{} (all tenants)", family),
            InvalidationTarget::All => f.write_str("everything"),
        }
    }
}

/// Published after every completed invalidation
#[derive(Debug, Clone, Serialize)]
pub struct InvalidationEvent {
    pub target: InvalidationTarget,
    pub pattern: String,
    pub deleted: u64,
}

/// Pattern-based cache invalidation
#[derive(Clone)]
pub struct Invalidator {
    store: Arc<dyn CacheStore>,
    keys: KeyGenerator,
    events: broadcast::Sender<InvalidationEvent>,
    /// Set when an invalidation could not reach the store
    missed: Arc<AtomicBool>,
}

impl Invalidator {
    pub fn new(store: Arc<dyn CacheStore>, keys: KeyGenerator) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            store,
            keys,
            events,
            missed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether an invalidation was skipped since the last recovery flush
    pub fn has_missed_invalidations(&self) -> bool {
        self.missed.load(Ordering::SeqCst)
    }

    /// Clear the namespace whenever the store becomes ready after missing an invalidation.
    ///
    /// Runs until the returned handle is aborted.
    pub fn spawn_recovery_watch(&self) -> JoinHandle<()> {
        let invalidator = self.clone();
        let mut states = self.store.health().subscribe();

        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                if state == Readiness::Ready && invalidator.missed.swap(false, Ordering::SeqCst) {
                    info!("♻️  Cache store is back; clearing entries that missed invalidation");
                    invalidator.invalidate_all().await;
                }
            }
        })
    }

    /// Subscribe to completed invalidations
    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.events.subscribe()
    }

    /// Delete every key starting with `<prefix><pattern_prefix>`
    pub async fn invalidate(&self, pattern_prefix: &str) -> u64 {
        let pattern = self.keys.prefix_pattern(pattern_prefix);
        self.delete_matching(
            InvalidationTarget::Prefix {
                prefix: pattern_prefix.to_string(),
            },
            pattern,
        )
        .await
    }

    /// Delete the cached views of one family, for one tenant or for all of them
    pub async fn invalidate_family(&self, family: ResourceFamily, selector: Option<&str>) -> u64 {
        let pattern = self.pattern_for(family, selector);
        self.delete_matching(
            InvalidationTarget::Family {
                family,
                selector: selector.map(str::to_string),
            },
            pattern,
        )
        .await
    }

    /// Invalidate after a successful write to `family`, including dependent families
    pub async fn invalidate_for_write(
        &self,
        family: ResourceFamily,
        selector: Option<&str>,
    ) -> u64 {
        let mut deleted = self.invalidate_family(family, selector).await;
        for dependent in family.dependents() {
            deleted += self.invalidate_family(*dependent, selector).await;
        }
        deleted
    }

    /// Drop every cached response
    pub async fn invalidate_all(&self) -> u64 {
        let pattern = self.keys.prefix_pattern("");
        self.delete_matching(InvalidationTarget::All, pattern).await
    }

    /// Dispatch on an explicit target, as received by the admin endpoint
    pub async fn invalidate_target(&self, target: &InvalidationTarget) -> u64 {
        match target {
            InvalidationTarget::Prefix { prefix } => self.invalidate(prefix).await,
            InvalidationTarget::Family { family, selector } => {
                self.invalidate_family(*family, selector.as_deref()).await
            }
            InvalidationTarget::All => self.invalidate_all().await,
        }
    }

    fn pattern_for(&self, family: ResourceFamily, selector: Option<&str>) -> InvalidationPattern {
        match (family.is_selector_scoped(), selector) {
            (true, Some(selector)) => self.keys.selector_pattern(family.read_path(), selector),
            (true, None) => self.keys.family_pattern(family.read_path()),
            (false, _) => self.keys.prefix_pattern(family.read_path()),
        }
    }

    async fn delete_matching(
        &self,
        target: InvalidationTarget,
        pattern: InvalidationPattern,
    ) -> u64 {
        if !self.store.is_ready() {
            self.missed.store(true, Ordering::SeqCst);
            debug!(%target, "Cache store not ready, skipping invalidation");
            return 0;
        }

        let deleted = match self.try_delete(&pattern).await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.missed.store(true, Ordering::SeqCst);
                warn!(%target, pattern = %pattern, error = %e, "Cache invalidation failed");
                return 0;
            }
        };

        metrics::counter!("cache_invalidated_keys_total").increment(deleted);
        if deleted > 0 {
            info!(%target, pattern = %pattern, deleted, "🗑️  Invalidated cached responses");
        } else {
            debug!(%target, pattern = %pattern, "No cached responses to invalidate");
        }

        // nobody listening is fine
        let _ = self.events.send(InvalidationEvent {
            target,
            pattern: pattern.to_string(),
            deleted,
        });

        deleted
    }

    async fn try_delete(&self, pattern: &InvalidationPattern) -> CacheResult<u64> {
        let keys = self.store.keys(pattern.as_str()).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.store.delete(&keys).await
    }
}
