//! # Response Caching Module
//!
//! This module implements the cache-aside layer that sits in front of the public read
//! endpoints. Reads are served from the store when a matching entry exists; misses run the
//! real handler and persist its JSON payload; writes delete every key a reader of the mutated
//! resource family could have produced.
//!
//! ## Architecture
//! The caching system is split into small pieces that are wired together explicitly at
//! startup (no global connection object):
//! 1. **Stores** ([`stores`]): the [`CacheStore`] trait with Redis and in-memory backends
//! 2. **Health** ([`health`]): the ready/degraded state machine every component consults
//! 3. **Key generation** ([`key_generator`]): deterministic keys and invalidation patterns
//! 4. **Middleware** ([`middleware`]): the read interceptor that short-circuits hits
//! 5. **Writer** ([`writer`]): detached, drainable cache writes
//! 6. **Invalidation** ([`invalidation`]): pattern-based deletion after successful writes
//! 7. **Admin** ([`admin`]): endpoints to inspect readiness and force invalidation
//!
//! ## The One Rule
//! The cache is an optimization, never a dependency. Every [`CacheError`] is recovered inside
//! this module: a failed lookup becomes a miss, a failed write or delete becomes a no-op, and
//! an unreachable store puts the layer into degraded mode where requests go straight to the
//! handlers.
//!
//! ## Usage Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use qarmenu_api::caching::{InMemoryCache, KeyGenerator, ResponseCache, Invalidator, ResourceFamily};
//!
//! let store = Arc::new(InMemoryCache::new());
//! let keys = KeyGenerator::new("cache:", "restaurant_id");
//! let cache = ResponseCache::new(store.clone(), keys.clone(), 1024 * 1024);
//! let invalidator = Invalidator::new(store, keys);
//!
//! // wrap a read route
//! let route = cache.route(Duration::from_secs(60));
//!
//! // after a successful write for restaurant 7
//! invalidator.invalidate_for_write(ResourceFamily::Categories, Some("7")).await;
//! ```

pub mod admin;
pub mod health;
pub mod invalidation;
pub mod key_generator;
pub mod middleware;
pub mod stores;
pub mod writer;

pub use admin::{CacheAdminRouter, CacheAdminState};
pub use health::{CacheHealth, HealthSnapshot, Readiness};
pub use invalidation::{InvalidationEvent, InvalidationTarget, Invalidator, ResourceFamily};
pub use key_generator::{CacheKey, InvalidationPattern, KeyGenerator};
pub use middleware::{cache_response, CacheStatus, CachedRoute, ResponseCache, X_CACHE};
pub use stores::{CacheStore, InMemoryCache, RedisCache, RedisCacheConfig};
pub use writer::CacheWriter;

/// Cache operation result
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache configuration error: {message}")]
    Configuration { message: String },

    #[error("Cache operation timeout")]
    Timeout,

    #[error("Cache not available")]
    Unavailable,
}

impl CacheError {
    /// Create a generic store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}
