//! Shared fixtures for the integration suites: a fully wired router over an in-memory cache
//! store the tests can switch off, plus admin token minting.

#![allow(dead_code)]

use axum::http::{header::AUTHORIZATION, HeaderValue};
use axum_test::{TestResponse, TestServer};
use jsonwebtoken::{encode, EncodingKey, Header};
use qarmenu_api::api::{self, AppState};
use qarmenu_api::auth::{Claims, JwtVerifier};
use qarmenu_api::caching::{InMemoryCache, Invalidator, KeyGenerator, ResponseCache, X_CACHE};
use qarmenu_api::core::config::AuthConfig;
use qarmenu_api::storage::InMemoryRepository;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const SECRET: &str = "integration-secret";

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryCache>,
    pub state: AppState,
    recovery_watch: JoinHandle<()>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.recovery_watch.abort();
    }
}

pub fn test_app() -> TestApp {
    let store = Arc::new(InMemoryCache::new());
    let keys = KeyGenerator::new("cache:", "restaurant_id");
    let cache = ResponseCache::new(store.clone(), keys.clone(), 1024 * 1024);
    let invalidator = Invalidator::new(store.clone(), keys);
    let recovery_watch = invalidator.spawn_recovery_watch();

    let state = AppState {
        repository: Arc::new(InMemoryRepository::new()),
        cache,
        invalidator,
        verifier: JwtVerifier::new(&AuthConfig {
            jwt_secret: SECRET.to_string(),
            ..Default::default()
        }),
        cache_enabled: true,
        public_ttl: Duration::from_secs(60),
        metrics: None,
    };

    TestApp {
        server: TestServer::new(api::router(state.clone())).unwrap(),
        store,
        state,
        recovery_watch,
    }
}

pub fn token_with_role(role: &str) -> HeaderValue {
    let claims = Claims {
        id: 1,
        username: "owner".to_string(),
        restaurant_id: None,
        role: role.to_string(),
        exp: chrono::Utc::now().timestamp() + 3600,
        iat: Some(chrono::Utc::now().timestamp()),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

pub fn admin_token() -> HeaderValue {
    token_with_role("admin")
}

pub fn cache_status(response: &TestResponse) -> Option<String> {
    response
        .headers()
        .get(X_CACHE)
        .map(|value| value.to_str().unwrap().to_string())
}

impl TestApp {
    /// Wait for background cache writes so the next read can hit
    pub async fn settle(&self) {
        self.state.cache.writer().flush().await;
    }

    pub async fn create_restaurant(&self, name: &str, slug: &str) -> i64 {
        let response = self
            .server
            .post("/api/restaurants")
            .add_header(AUTHORIZATION, admin_token())
            .json(&json!({ "name": name, "slug": slug }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["id"].as_i64().unwrap()
    }

    pub async fn create_category(&self, restaurant_id: i64, name: &str) -> i64 {
        let response = self
            .server
            .post("/api/categories")
            .add_header(AUTHORIZATION, admin_token())
            .json(&json!({ "name": name, "restaurant_id": restaurant_id }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["id"].as_i64().unwrap()
    }

    pub async fn create_menu_item(
        &self,
        restaurant_id: i64,
        category_id: Option<i64>,
        name: &str,
    ) -> i64 {
        let response = self
            .server
            .post("/api/menu")
            .add_header(AUTHORIZATION, admin_token())
            .json(&json!({
                "name": name,
                "price": 4.5,
                "category_id": category_id,
                "restaurant_id": restaurant_id,
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["id"].as_i64().unwrap()
    }

    pub async fn public_categories(&self, restaurant_id: i64) -> TestResponse {
        self.public_categories_as(&restaurant_id.to_string()).await
    }

    /// Public category read with the selector written exactly as given
    pub async fn public_categories_as(&self, restaurant_id: &str) -> TestResponse {
        self.server
            .get("/api/categories/public")
            .add_query_param("restaurant_id", restaurant_id)
            .await
    }

    pub async fn public_menu(&self, restaurant_id: i64) -> TestResponse {
        self.server
            .get("/api/menu/public")
            .add_query_param("restaurant_id", restaurant_id)
            .await
    }
}
