//! Restaurant routes.
//!
//! The public slug lookup is cached without a tenant selector, so restaurant writes clear the
//! whole restaurant family: after a slug change the old key can no longer be derived from the
//! row. Deleting a restaurant also removes its categories and menu, so those views go too.

use super::AppState;
use crate::auth::{require_admin, AdminContext};
use crate::caching::ResourceFamily;
use crate::core::error::{ApiError, ApiResult};
use crate::storage::{NewRestaurant, Restaurant};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/by-slug/:slug", state.cached(get(get_by_slug)));

    let admin = Router::new()
        .route("/", get(list_restaurants).post(create_restaurant))
        .route(
            "/:id",
            get(get_restaurant)
                .put(update_restaurant)
                .delete(delete_restaurant),
        )
        .route_layer(from_fn_with_state(state.verifier.clone(), require_admin));

    public.merge(admin)
}

async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Restaurant>> {
    state
        .repository
        .find_restaurant_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("restaurant '{}'", slug)))
}

async fn list_restaurants(State(state): State<AppState>) -> ApiResult<Json<Vec<Restaurant>>> {
    Ok(Json(state.repository.list_restaurants().await?))
}

async fn get_restaurant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Restaurant>> {
    Ok(Json(state.repository.get_restaurant(id).await?))
}

async fn create_restaurant(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(new): Json<NewRestaurant>,
) -> ApiResult<(StatusCode, Json<Restaurant>)> {
    let restaurant = state.repository.create_restaurant(new).await?;
    info!(admin = %admin.username, restaurant_id = restaurant.id, "Restaurant created");
    Ok((StatusCode::CREATED, Json(restaurant)))
}

async fn update_restaurant(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<i64>,
    Json(update): Json<NewRestaurant>,
) -> ApiResult<Json<Restaurant>> {
    let restaurant = state.repository.update_restaurant(id, update).await?;
    info!(admin = %admin.username, restaurant_id = id, "Restaurant updated");

    state
        .invalidator
        .invalidate_for_write(ResourceFamily::Restaurant, None)
        .await;
    Ok(Json(restaurant))
}

async fn delete_restaurant(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.repository.delete_restaurant(id).await?;
    info!(admin = %admin.username, restaurant_id = id, "Restaurant deleted");

    let selector = id.to_string();
    for family in ResourceFamily::ALL {
        state
            .invalidator
            .invalidate_family(family, Some(&selector))
            .await;
    }
    Ok(Json(json!({ "message": "Restaurant deleted successfully" })))
}
