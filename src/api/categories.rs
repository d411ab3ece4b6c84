//! Category routes.

use super::{AppState, TenantQuery};
use crate::auth::{require_admin, AdminContext};
use crate::caching::ResourceFamily;
use crate::core::error::ApiResult;
use crate::storage::{Category, NewCategory};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/public", state.cached(get(list_categories)));

    let admin = Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
        .route_layer(from_fn_with_state(state.verifier.clone(), require_admin));

    public.merge(admin)
}

async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Vec<Category>>> {
    let restaurant_id = query.require()?;
    Ok(Json(state.repository.list_categories(restaurant_id).await?))
}

async fn create_category(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(new): Json<NewCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = state.repository.create_category(new).await?;
    info!(admin = %admin.username, category_id = category.id, "Category created");

    state
        .invalidator
        .invalidate_for_write(
            ResourceFamily::Categories,
            Some(&category.restaurant_id.to_string()),
        )
        .await;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<i64>,
    Json(update): Json<NewCategory>,
) -> ApiResult<Json<Category>> {
    let category = state.repository.update_category(id, update).await?;
    info!(admin = %admin.username, category_id = id, "Category updated");

    state
        .invalidator
        .invalidate_for_write(
            ResourceFamily::Categories,
            Some(&category.restaurant_id.to_string()),
        )
        .await;
    Ok(Json(category))
}

async fn delete_category(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<i64>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Value>> {
    let restaurant_id = query.require()?;
    state.repository.delete_category(id, restaurant_id).await?;
    info!(admin = %admin.username, category_id = id, "Category deleted");

    state
        .invalidator
        .invalidate_for_write(ResourceFamily::Categories, Some(&restaurant_id.to_string()))
        .await;
    Ok(Json(json!({ "message": "Category deleted successfully" })))
}
