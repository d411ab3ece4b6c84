//! End-to-end cache behavior through the real router: hit/miss labelling, invalidation after
//! writes, tenant isolation and the admin cache endpoints.

mod common;

use axum::http::{
    header::{ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, AUTHORIZATION, ORIGIN},
    HeaderValue, StatusCode,
};
use axum_test::TestServer;
use common::{admin_token, cache_status, test_app, token_with_role};
use qarmenu_api::core::config::{AppConfig, CacheBackend};
use qarmenu_api::AppServer;
use serde_json::{json, Value};

#[tokio::test]
async fn test_public_categories_miss_then_hit_and_invalidation() {
    let app = test_app();
    let seven = app.create_restaurant("Seven", "seven").await;
    let three = app.create_restaurant("Three", "three").await;
    app.create_category(seven, "Drinks").await;
    app.create_category(three, "Desserts").await;

    // warm both tenants
    let first = app.public_categories(seven).await;
    assert_eq!(first.status_code(), StatusCode::OK);
    assert_eq!(cache_status(&first).as_deref(), Some("MISS"));
    let other_before = app.public_categories(three).await;
    assert_eq!(cache_status(&other_before).as_deref(), Some("MISS"));
    app.settle().await;

    let second = app.public_categories(seven).await;
    assert_eq!(cache_status(&second).as_deref(), Some("HIT"));
    assert_eq!(first.as_bytes(), second.as_bytes());

    // write for tenant seven
    app.create_category(seven, "Starters").await;

    let after_write = app.public_categories(seven).await;
    assert_eq!(cache_status(&after_write).as_deref(), Some("MISS"));
    let names: Vec<String> = after_write
        .json::<Vec<Value>>()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Drinks", "Starters"]);

    // the untouched tenant still hits with its prior body
    let other_after = app.public_categories(three).await;
    assert_eq!(cache_status(&other_after).as_deref(), Some("HIT"));
    assert_eq!(other_before.as_bytes(), other_after.as_bytes());
}

#[tokio::test]
async fn test_category_rename_refreshes_menu_listing() {
    let app = test_app();
    let restaurant = app.create_restaurant("Cafe", "cafe").await;
    let category = app.create_category(restaurant, "Drinks").await;
    app.create_menu_item(restaurant, Some(category), "Tea").await;

    app.public_menu(restaurant).await;
    app.settle().await;
    assert_eq!(
        cache_status(&app.public_menu(restaurant).await).as_deref(),
        Some("HIT")
    );

    let response = app
        .server
        .put(&format!("/api/categories/{}", category))
        .add_header(AUTHORIZATION, admin_token())
        .json(&json!({ "name": "Hot Drinks", "restaurant_id": restaurant }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let menu = app.public_menu(restaurant).await;
    assert_eq!(cache_status(&menu).as_deref(), Some("MISS"));
    assert_eq!(menu.json::<Vec<Value>>()[0]["category_name"], "Hot Drinks");
}

#[tokio::test]
async fn test_menu_write_is_tenant_scoped() {
    let app = test_app();
    let a = app.create_restaurant("A", "a").await;
    let b = app.create_restaurant("B", "b").await;
    let item = app.create_menu_item(a, None, "Soup").await;
    app.create_menu_item(b, None, "Salad").await;

    app.public_menu(a).await;
    app.public_menu(b).await;
    app.settle().await;

    let response = app
        .server
        .delete(&format!("/api/menu/{}", item))
        .add_query_param("restaurant_id", a)
        .add_header(AUTHORIZATION, admin_token())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let menu_a = app.public_menu(a).await;
    assert_eq!(cache_status(&menu_a).as_deref(), Some("MISS"));
    assert!(menu_a.json::<Vec<Value>>().is_empty());
    assert_eq!(cache_status(&app.public_menu(b).await).as_deref(), Some("HIT"));
}

#[tokio::test]
async fn test_failed_write_leaves_cache_untouched() {
    let app = test_app();
    let owner = app.create_restaurant("Owner", "owner").await;
    let intruder = app.create_restaurant("Intruder", "intruder").await;
    let category = app.create_category(owner, "Mains").await;

    app.public_categories(owner).await;
    app.settle().await;

    // ownership mismatch: the write never happens
    let response = app
        .server
        .delete(&format!("/api/categories/{}", category))
        .add_query_param("restaurant_id", intruder)
        .add_header(AUTHORIZATION, admin_token())
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    assert_eq!(
        cache_status(&app.public_categories(owner).await).as_deref(),
        Some("HIT")
    );
}

#[tokio::test]
async fn test_slug_change_invalidates_restaurant_lookups() {
    let app = test_app();
    let id = app.create_restaurant("Cafe", "cafe").await;

    let first = app.server.get("/api/restaurants/by-slug/cafe").await;
    assert_eq!(cache_status(&first).as_deref(), Some("MISS"));
    app.settle().await;
    let cached = app.server.get("/api/restaurants/by-slug/cafe").await;
    assert_eq!(cache_status(&cached).as_deref(), Some("HIT"));

    let response = app
        .server
        .put(&format!("/api/restaurants/{}", id))
        .add_header(AUTHORIZATION, admin_token())
        .json(&json!({ "name": "Cafe", "slug": "cafe-new" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let old = app.server.get("/api/restaurants/by-slug/cafe").await;
    assert_eq!(old.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(cache_status(&old).as_deref(), Some("MISS"));

    let new = app.server.get("/api/restaurants/by-slug/cafe-new").await;
    assert_eq!(new.json::<Value>()["id"], id);
}

#[tokio::test]
async fn test_restaurant_delete_clears_tenant_views() {
    let app = test_app();
    let id = app.create_restaurant("Gone", "gone").await;
    app.create_category(id, "Soon empty").await;

    app.public_categories(id).await;
    app.settle().await;

    let response = app
        .server
        .delete(&format!("/api/restaurants/{}", id))
        .add_header(AUTHORIZATION, admin_token())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let categories = app.public_categories(id).await;
    assert_eq!(cache_status(&categories).as_deref(), Some("MISS"));
    assert!(categories.json::<Vec<Value>>().is_empty());
}

#[tokio::test]
async fn test_padded_selector_is_invalidated_with_its_tenant() {
    let app = test_app();
    let id = app.create_restaurant("Padded", "padded").await;
    app.create_category(id, "Drinks").await;
    let padded = format!("0{}", id);

    let first = app.public_categories_as(&padded).await;
    assert_eq!(first.status_code(), StatusCode::OK);
    assert_eq!(cache_status(&first).as_deref(), Some("MISS"));
    app.settle().await;

    // the padded and plain forms name the same tenant and share one entry
    let plain = app.public_categories(id).await;
    assert_eq!(cache_status(&plain).as_deref(), Some("HIT"));
    assert_eq!(first.as_bytes(), plain.as_bytes());

    app.create_category(id, "Starters").await;

    let after_write = app.public_categories_as(&padded).await;
    assert_eq!(cache_status(&after_write).as_deref(), Some("MISS"));
    assert_eq!(after_write.json::<Vec<Value>>().len(), 2);
}

#[tokio::test]
async fn test_query_parameter_order_shares_an_entry() {
    let app = test_app();
    let id = app.create_restaurant("Order", "order").await;

    let first = app
        .server
        .get("/api/menu/public")
        .add_query_param("restaurant_id", id)
        .add_query_param("lang", "en")
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);
    assert_eq!(cache_status(&first).as_deref(), Some("MISS"));
    app.settle().await;

    let swapped = app
        .server
        .get("/api/menu/public")
        .add_query_param("lang", "en")
        .add_query_param("restaurant_id", id)
        .await;
    assert_eq!(cache_status(&swapped).as_deref(), Some("HIT"));
}

#[tokio::test]
async fn test_missing_selector_is_a_client_error_and_not_cached() {
    let app = test_app();

    let response = app.server.get("/api/categories/public").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(cache_status(&response).as_deref(), Some("MISS"));
    app.settle().await;
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let app = test_app();

    let response = app
        .server
        .post("/api/categories")
        .json(&json!({ "name": "x", "restaurant_id": 1 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .get("/api/restaurants")
        .add_header(AUTHORIZATION, token_with_role("waiter"))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app
        .server
        .get("/api/admin/cache")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], 401);
}

#[tokio::test]
async fn test_admin_cache_endpoints() {
    let app = test_app();
    let id = app.create_restaurant("Admin", "admin").await;
    app.public_categories(id).await;
    app.public_menu(id).await;
    app.settle().await;

    let status = app
        .server
        .get("/api/admin/cache")
        .add_header(AUTHORIZATION, admin_token())
        .await;
    assert_eq!(status.status_code(), StatusCode::OK);
    assert_eq!(status.json::<Value>()["health"]["state"], "ready");

    let response = app
        .server
        .post("/api/admin/cache/invalidate")
        .add_header(AUTHORIZATION, admin_token())
        .json(&json!({ "prefix": "/api/categories/" }))
        .await;
    assert_eq!(response.json::<Value>()["deleted"], 1);

    assert_eq!(
        cache_status(&app.public_categories(id).await).as_deref(),
        Some("MISS")
    );
    assert_eq!(cache_status(&app.public_menu(id).await).as_deref(), Some("HIT"));
}

#[tokio::test]
async fn test_health_reports_cache_state() {
    let app = test_app();

    let body: Value = app.server.get("/health").await.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cache"]["backend"], "memory");
    assert_eq!(body["cache"]["state"], "ready");

    app.store.set_available(false);
    let body: Value = app.server.get("/health").await.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cache"]["state"], "degraded");
}

#[tokio::test]
async fn test_cors_exposes_cache_header() {
    let mut config = AppConfig::default();
    config.cache.backend = CacheBackend::Memory;
    config.auth.jwt_secret = "cors-secret".to_string();
    config.server.cors_origins = vec!["https://menu.example.com".to_string()];

    let app = AppServer::build(config, None).unwrap();
    let server = TestServer::new(app.router().unwrap()).unwrap();

    let response = server
        .get("/health")
        .add_header(ORIGIN, HeaderValue::from_static("https://menu.example.com"))
        .await;
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://menu.example.com"
    );
    let exposed = response
        .headers()
        .get(ACCESS_CONTROL_EXPOSE_HEADERS)
        .unwrap()
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains("x-cache"));
}
