//! # Cache Admin Interface
//!
//! Authenticated endpoints to inspect the cache layer and to force invalidation by hand.
//! The router is mounted under `/api/admin` behind the admin auth layer.

use super::health::HealthSnapshot;
use super::invalidation::{InvalidationTarget, Invalidator, ResourceFamily};
use super::stores::CacheStore;
use super::writer::CacheWriter;
use crate::core::error::{ApiError, ApiResult};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Cache admin state
#[derive(Clone)]
pub struct CacheAdminState {
    pub store: Arc<dyn CacheStore>,
    pub invalidator: Invalidator,
    pub writer: CacheWriter,
    pub key_prefix: String,
}

/// Cache admin router
pub struct CacheAdminRouter;

impl CacheAdminRouter {
    /// Create cache admin router
    pub fn create_router(state: CacheAdminState) -> Router {
        Router::new()
            .route("/cache", get(get_cache_status))
            .route("/cache/invalidate", post(invalidate_cache))
            .with_state(state)
    }
}

/// Cache status response
#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    pub backend: &'static str,
    pub key_prefix: String,
    pub reachable: bool,
    pub health: HealthSnapshot,
    pub pending_writes: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Tenant id given either as a JSON number or a string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SelectorValue {
    Number(i64),
    Text(String),
}

impl SelectorValue {
    fn into_selector(self) -> String {
        match self {
            SelectorValue::Number(id) => id.to_string(),
            SelectorValue::Text(text) => text,
        }
    }
}

/// Manual invalidation request; exactly one of the three forms
#[derive(Debug, Default, Deserialize)]
pub struct InvalidateRequest {
    pub prefix: Option<String>,
    pub family: Option<String>,
    pub restaurant_id: Option<SelectorValue>,
    #[serde(default)]
    pub all: bool,
}

impl InvalidateRequest {
    fn into_target(self) -> ApiResult<InvalidationTarget> {
        match (self.prefix, self.family, self.all) {
            (Some(prefix), None, false) => {
                if prefix.is_empty() {
                    return Err(ApiError::validation("prefix", "must not be empty"));
                }
                Ok(InvalidationTarget::Prefix { prefix })
            }
            (None, Some(family), false) => {
                let family: ResourceFamily = family
                    .parse()
                    .map_err(|reason: String| ApiError::validation("family", reason))?;
                Ok(InvalidationTarget::Family {
                    family,
                    selector: self.restaurant_id.map(SelectorValue::into_selector),
                })
            }
            (None, None, true) => Ok(InvalidationTarget::All),
            _ => Err(ApiError::validation(
                "body",
                "expected exactly one of `prefix`, `family` or `all: true`",
            )),
        }
    }
}

/// Manual invalidation response
#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub target: InvalidationTarget,
    pub deleted: u64,
}

/// Get cache status
async fn get_cache_status(State(state): State<CacheAdminState>) -> Json<CacheStatusResponse> {
    let reachable = state.store.health_check().await.unwrap_or(false);

    Json(CacheStatusResponse {
        backend: state.store.backend_name(),
        key_prefix: state.key_prefix.clone(),
        reachable,
        health: state.store.health().snapshot(),
        pending_writes: state.writer.pending(),
        timestamp: chrono::Utc::now(),
    })
}

/// Invalidate cached responses
async fn invalidate_cache(
    State(state): State<CacheAdminState>,
    Json(request): Json<InvalidateRequest>,
) -> ApiResult<Json<InvalidateResponse>> {
    let target = request.into_target()?;
    let deleted = state.invalidator.invalidate_target(&target).await;

    info!(%target, deleted, "Manual cache invalidation");
    Ok(Json(InvalidateResponse { target, deleted }))
}
