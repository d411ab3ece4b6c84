//! Menu item routes.

use super::{AppState, TenantQuery};
use crate::auth::{require_admin, AdminContext};
use crate::caching::ResourceFamily;
use crate::core::error::ApiResult;
use crate::storage::{MenuItem, NewMenuItem};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/public", state.cached(get(list_menu_items)));

    let admin = Router::new()
        .route("/", get(list_menu_items).post(create_menu_item))
        .route(
            "/:id",
            get(get_menu_item)
                .put(update_menu_item)
                .delete(delete_menu_item),
        )
        .route_layer(from_fn_with_state(state.verifier.clone(), require_admin));

    public.merge(admin)
}

async fn list_menu_items(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Vec<MenuItem>>> {
    let restaurant_id = query.require()?;
    Ok(Json(state.repository.list_menu_items(restaurant_id).await?))
}

async fn get_menu_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MenuItem>> {
    Ok(Json(state.repository.get_menu_item(id).await?))
}

async fn create_menu_item(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(new): Json<NewMenuItem>,
) -> ApiResult<(StatusCode, Json<MenuItem>)> {
    let item = state.repository.create_menu_item(new).await?;
    info!(admin = %admin.username, menu_item_id = item.id, "Menu item created");

    state
        .invalidator
        .invalidate_for_write(ResourceFamily::Menu, Some(&item.restaurant_id.to_string()))
        .await;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_menu_item(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<i64>,
    Json(update): Json<NewMenuItem>,
) -> ApiResult<Json<MenuItem>> {
    let item = state.repository.update_menu_item(id, update).await?;
    info!(admin = %admin.username, menu_item_id = id, "Menu item updated");

    state
        .invalidator
        .invalidate_for_write(ResourceFamily::Menu, Some(&item.restaurant_id.to_string()))
        .await;
    Ok(Json(item))
}

async fn delete_menu_item(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<i64>,
    Query(query): Query<TenantQuery>,
) -> ApiResult<Json<Value>> {
    let restaurant_id = query.require()?;
    state.repository.delete_menu_item(id, restaurant_id).await?;
    info!(admin = %admin.username, menu_item_id = id, "Menu item deleted");

    state
        .invalidator
        .invalidate_for_write(ResourceFamily::Menu, Some(&restaurant_id.to_string()))
        .await;
    Ok(Json(json!({ "message": "Menu item deleted successfully" })))
}
