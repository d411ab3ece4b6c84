//! Liveness and metrics endpoints.
//!
//! `/health` always answers 200 while the process serves requests; a degraded cache only shows
//! up in the `cache` section because the API keeps working without it.

use super::AppState;
use crate::caching::HealthSnapshot;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cache: CacheHealthSection,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct CacheHealthSection {
    pub enabled: bool,
    pub backend: &'static str,
    #[serde(flatten)]
    pub health: HealthSnapshot,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.cache.store();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cache: CacheHealthSection {
            enabled: state.cache_enabled,
            backend: store.backend_name(),
            health: store.health().snapshot(),
        },
        timestamp: chrono::Utc::now(),
    })
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
