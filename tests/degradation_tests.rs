//! Behavior while the cache store is unavailable or failing: responses must be identical to a
//! healthy run apart from the missing `X-Cache` header, and recovery must not serve entries that
//! missed an invalidation during the outage.

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use common::{admin_token, cache_status, test_app, TestApp};
use qarmenu_api::caching::CacheStore;
use serde_json::{json, Value};
use std::time::Duration;

/// Run the same read/write sequence and collect (status, body) per step
async fn scripted_session(app: &TestApp) -> Vec<(StatusCode, Value)> {
    let mut seen = Vec::new();
    let id = app.create_restaurant("Script", "script").await;
    let category = app.create_category(id, "Drinks").await;
    app.create_menu_item(id, Some(category), "Lemonade").await;

    for _ in 0..2 {
        let response = app.public_categories(id).await;
        seen.push((response.status_code(), response.json::<Value>()));
        app.settle().await;
    }

    app.create_category(id, "Snacks").await;

    let response = app.public_categories(id).await;
    seen.push((response.status_code(), response.json::<Value>()));
    let response = app.public_menu(id).await;
    seen.push((response.status_code(), response.json::<Value>()));
    let response = app.server.get("/api/restaurants/by-slug/script").await;
    seen.push((response.status_code(), response.json::<Value>()));
    let response = app.server.get("/api/restaurants/by-slug/missing").await;
    seen.push((response.status_code(), response.json::<Value>()));

    let statuses: Vec<StatusCode> = seen.iter().map(|(status, _)| *status).collect();
    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::NOT_FOUND,
        ]
    );
    assert_eq!(seen[2].1.as_array().map(Vec::len), Some(2));

    seen
}

async fn wait_until_empty(app: &TestApp) {
    for _ in 0..50 {
        if app.store.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_outage_is_invisible_apart_from_header() {
    let healthy = test_app();
    let degraded = test_app();
    degraded.store.set_available(false);

    let expected = scripted_session(&healthy).await;
    let actual = scripted_session(&degraded).await;

    assert_eq!(expected, actual);
    assert!(degraded.store.is_empty());
}

#[tokio::test]
async fn test_degraded_reads_carry_no_cache_header() {
    let app = test_app();
    let id = app.create_restaurant("Quiet", "quiet").await;
    app.store.set_available(false);

    for _ in 0..3 {
        let response = app.public_categories(id).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(cache_status(&response).is_none());
    }
}

#[tokio::test]
async fn test_writes_succeed_while_degraded() {
    let app = test_app();
    let id = app.create_restaurant("Busy", "busy").await;
    app.store.set_available(false);

    let response = app
        .server
        .post("/api/menu")
        .add_header(AUTHORIZATION, admin_token())
        .json(&json!({ "name": "Stew", "price": 9.0, "restaurant_id": id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert!(app.state.invalidator.has_missed_invalidations());
}

#[tokio::test]
async fn test_recovery_resumes_caching() {
    let app = test_app();
    let id = app.create_restaurant("Back", "back").await;

    app.store.set_available(false);
    app.public_menu(id).await;
    app.store.set_available(true);

    let first = app.public_menu(id).await;
    assert_eq!(cache_status(&first).as_deref(), Some("MISS"));
    app.settle().await;
    let second = app.public_menu(id).await;
    assert_eq!(cache_status(&second).as_deref(), Some("HIT"));
}

#[tokio::test]
async fn test_write_during_outage_is_not_served_stale_after_recovery() {
    let app = test_app();
    let id = app.create_restaurant("Stale", "stale").await;
    app.create_category(id, "Old").await;

    app.public_categories(id).await;
    app.settle().await;
    assert!(!app.store.is_empty());

    // the invalidation for this write is skipped while the store is down
    app.store.set_available(false);
    app.create_category(id, "New").await;
    app.store.set_available(true);
    wait_until_empty(&app).await;

    let response = app.public_categories(id).await;
    assert_eq!(cache_status(&response).as_deref(), Some("MISS"));
    assert_eq!(response.json::<Vec<Value>>().len(), 2);
    assert!(!app.state.invalidator.has_missed_invalidations());
}

#[tokio::test]
async fn test_failing_store_still_answers() {
    let app = test_app();
    let id = app.create_restaurant("Flaky", "flaky").await;
    app.create_category(id, "Mains").await;
    app.store.set_failing(true);

    for _ in 0..2 {
        let response = app.public_categories(id).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Vec<Value>>()[0]["name"], "Mains");
        app.settle().await;
    }

    let response = app
        .server
        .post("/api/categories")
        .add_header(AUTHORIZATION, admin_token())
        .json(&json!({ "name": "Sides", "restaurant_id": id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_failed_invalidation_is_flushed_once_store_recovers() {
    let app = test_app();
    let id = app.create_restaurant("Hiccup", "hiccup").await;
    app.create_category(id, "Old").await;

    app.public_categories(id).await;
    app.settle().await;

    // the store still reports ready, so the invalidation is attempted and fails
    app.store.set_failing(true);
    app.create_category(id, "New").await;
    assert!(!app.store.is_ready());
    assert!(app.state.invalidator.has_missed_invalidations());

    app.store.set_failing(false);
    wait_until_empty(&app).await;

    let response = app.public_categories(id).await;
    assert_eq!(cache_status(&response).as_deref(), Some("MISS"));
    assert_eq!(response.json::<Vec<Value>>().len(), 2);
}
