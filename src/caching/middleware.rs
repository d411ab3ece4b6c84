//! # Cache Middleware
//!
//! The read interceptor. A [`CachedRoute`] is attached to a read route with
//! `axum::middleware::from_fn_with_state`, and [`cache_response`] then decides per request
//! whether the real handler runs at all:
//!
//! ```text
//! request ──► store ready? ──no──► handler (no X-Cache)
//!                 │yes
//!                 ▼
//!           lookup key ──hit──► finalize(cached payload, HIT)
//!                 │miss
//!                 ▼
//!           handler ──► cacheable? ──yes──► spawn write ──► finalize(payload, MISS)
//!                           │no
//!                           └──────────────────────────────► finalize(payload, MISS)
//! ```
//!
//! The payload is captured in full before the write is scheduled, so a request dropped while
//! the handler is still running never produces a cache entry.
//!
//! ## Races
//!
//! Two windows are accepted rather than locked away, and both are bounded by the route TTL:
//!
//! - Concurrent misses for one key each run the handler and each schedule a write; the last
//!   write wins. The payloads come from the same data, so at worst an entry is written twice.
//! - A miss whose payload was read *before* a write can have its cache write land *after*
//!   that write's invalidation has run. The entry then holds the pre-write body until its TTL
//!   expires or the next write for the tenant invalidates it again. Closing this window would
//!   need a per-key version check between the handler and the store write.

use super::key_generator::{CacheKey, KeyGenerator};
use super::stores::CacheStore;
use super::writer::CacheWriter;
use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{OriginalUri, Request, State},
    http::{
        header::{ACCESS_CONTROL_EXPOSE_HEADERS, CACHE_CONTROL, CONTENT_TYPE},
        response::Parts,
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Response header carrying the cache status
pub const X_CACHE: &str = "x-cache";

/// Outcome of the cache lookup reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Shared cache-aside machinery for every cached route
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    keys: KeyGenerator,
    writer: CacheWriter,
    max_payload_bytes: usize,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, keys: KeyGenerator, max_payload_bytes: usize) -> Self {
        Self {
            store,
            keys,
            writer: CacheWriter::new(),
            max_payload_bytes,
        }
    }

    /// Use an existing writer, e.g. one the server drains on shutdown
    pub fn with_writer(mut self, writer: CacheWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Per-route state for [`cache_response`]
    pub fn route(&self, ttl: Duration) -> CachedRoute {
        CachedRoute {
            cache: self.clone(),
            ttl,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn keys(&self) -> &KeyGenerator {
        &self.keys
    }

    pub fn writer(&self) -> &CacheWriter {
        &self.writer
    }

    /// Fetch a cached payload, treating store errors and unparseable JSON as a miss
    async fn lookup(&self, key: &CacheKey) -> Option<Bytes> {
        let payload = match self.store.get(key.as_str()).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                metrics::counter!("cache_requests_total", "result" => "error").increment(1);
                warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
                return None;
            }
        };

        if let Err(e) = serde_json::from_slice::<serde_json::Value>(&payload) {
            warn!(key = %key, error = %e, "Discarding unparseable cached payload");
            return None;
        }

        Some(Bytes::from(payload))
    }
}

/// A [`ResponseCache`] bound to one route's TTL
#[derive(Clone)]
pub struct CachedRoute {
    cache: ResponseCache,
    ttl: Duration,
}

impl CachedRoute {
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Cache-aside middleware for read routes
pub async fn cache_response(
    State(route): State<CachedRoute>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if method != Method::GET && method != Method::HEAD {
        return next.run(request).await;
    }

    let cache = &route.cache;
    if !cache.store.is_ready() {
        metrics::counter!("cache_requests_total", "result" => "bypass").increment(1);
        debug!("Cache store not ready, calling handler directly");
        return next.run(request).await;
    }

    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone());
    let key = cache.keys.key_for_request(uri.path(), uri.query());

    if !wants_fresh(request.headers()) {
        if let Some(payload) = cache.lookup(&key).await {
            metrics::counter!("cache_requests_total", "result" => "hit").increment(1);
            debug!(key = %key, "Cache hit");
            let (mut parts, _) = StatusCode::OK.into_response().into_parts();
            parts
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            return finalize(parts, Body::from(payload), CacheStatus::Hit);
        }
    }

    metrics::counter!("cache_requests_total", "result" => "miss").increment(1);
    debug!(key = %key, "Cache miss");

    let response = next.run(request).await;
    let (parts, body) = response.into_parts();

    // HEAD bodies may already be stripped by the router
    if method != Method::GET || !is_cacheable(&parts, &body, cache.max_payload_bytes) {
        return finalize(parts, body, CacheStatus::Miss);
    }

    match axum::body::to_bytes(body, cache.max_payload_bytes).await {
        Ok(payload) => {
            cache
                .writer
                .spawn_write(cache.store.clone(), key, payload.to_vec(), route.ttl);
            finalize(parts, Body::from(payload), CacheStatus::Miss)
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to read response body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Attach cache status headers to an outgoing response
fn finalize(mut parts: Parts, payload: Body, status: CacheStatus) -> Response {
    parts
        .headers
        .insert(X_CACHE, HeaderValue::from_static(status.as_str()));
    parts
        .headers
        .append(ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static("X-Cache"));
    Response::from_parts(parts, payload)
}

/// `Cache-Control: no-cache` or `no-store` on the request skips the lookup
fn wants_fresh(headers: &HeaderMap) -> bool {
    headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|directive| directive.trim().to_ascii_lowercase())
        .any(|directive| directive == "no-cache" || directive == "no-store")
}

/// Only successful JSON bodies of a known, bounded size are stored
fn is_cacheable(parts: &Parts, body: &Body, max_payload_bytes: usize) -> bool {
    if !parts.status.is_success() {
        return false;
    }

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return false;
    }

    match body.size_hint().exact() {
        Some(size) => size <= max_payload_bytes as u64,
        None => false,
    }
}
