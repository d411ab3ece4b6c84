//! # HTTP API
//!
//! Route assembly for the menu API. Public read routes are wrapped with the cache interceptor;
//! admin routes sit behind [`require_admin`] and invalidate the affected cache families after a
//! successful write, before the response is sent.
//!
//! | Path | Cached | Auth |
//! |------|--------|------|
//! | `GET /api/categories/public` | yes | - |
//! | `GET /api/menu/public` | yes | - |
//! | `GET /api/restaurants/by-slug/:slug` | yes | - |
//! | everything else under `/api` | - | admin |
//! | `/health`, `/metrics` | - | - |

pub mod categories;
pub mod health;
pub mod menu;
pub mod restaurants;

use crate::auth::{require_admin, JwtVerifier};
use crate::caching::{cache_response, CacheAdminRouter, CacheAdminState, Invalidator, ResponseCache};
use crate::core::error::{ApiError, ApiResult};
use crate::storage::MenuRepository;
use axum::{middleware::from_fn_with_state, routing::MethodRouter, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Everything handlers need, injected at startup
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn MenuRepository>,
    pub cache: ResponseCache,
    pub invalidator: Invalidator,
    pub verifier: JwtVerifier,
    pub cache_enabled: bool,
    pub public_ttl: Duration,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wrap a read route with the cache interceptor when caching is enabled
    pub fn cached(&self, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
        if !self.cache_enabled {
            return route;
        }
        route.route_layer(from_fn_with_state(
            self.cache.route(self.public_ttl),
            cache_response,
        ))
    }

    fn cache_admin_state(&self) -> CacheAdminState {
        CacheAdminState {
            store: self.cache.store().clone(),
            invalidator: self.invalidator.clone(),
            writer: self.cache.writer().clone(),
            key_prefix: self.cache.keys().prefix().to_string(),
        }
    }
}

/// `?restaurant_id=` on public reads and deletes
#[derive(Debug, Clone, Deserialize)]
pub struct TenantQuery {
    pub restaurant_id: Option<i64>,
}

impl TenantQuery {
    pub fn require(&self) -> ApiResult<i64> {
        self.restaurant_id
            .ok_or_else(|| ApiError::validation("restaurant_id", "query parameter is required"))
    }
}

/// Build the complete application router
pub fn router(state: AppState) -> Router {
    let cache_admin = CacheAdminRouter::create_router(state.cache_admin_state())
        .layer(from_fn_with_state(state.verifier.clone(), require_admin));

    Router::new()
        .nest("/api/categories", categories::routes(&state))
        .nest("/api/menu", menu::routes(&state))
        .nest("/api/restaurants", restaurants::routes(&state))
        .nest_service("/api/admin", cache_admin)
        .merge(health::routes())
        .with_state(state)
}
