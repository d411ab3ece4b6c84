//! # Server
//!
//! Wires the application together and owns its lifecycle:
//!
//! 1. build the cache store from configuration (Redis or in-memory)
//! 2. build the key generator, interceptor and invalidator on top of that one store
//! 3. assemble the router with CORS and request tracing
//! 4. serve until a shutdown signal arrives
//! 5. drain pending cache writes and close the store
//!
//! Nothing here is global: every component receives the store it uses explicitly.

use crate::api::{self, AppState};
use crate::auth::JwtVerifier;
use crate::caching::{
    CacheStore, CacheWriter, InMemoryCache, Invalidator, KeyGenerator, RedisCache, ResponseCache,
};
use crate::core::config::{AppConfig, CacheBackend, ServerConfig};
use crate::core::error::{ApiError, ApiResult};
use crate::storage::{InMemoryRepository, MenuRepository};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// How often the in-memory store drops expired entries
const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// The concrete store behind the `dyn CacheStore`, kept for teardown
enum StoreHandle {
    Redis(Arc<RedisCache>),
    Memory(Arc<InMemoryCache>),
}

impl StoreHandle {
    fn as_dyn(&self) -> Arc<dyn CacheStore> {
        match self {
            StoreHandle::Redis(store) => store.clone(),
            StoreHandle::Memory(store) => store.clone(),
        }
    }
}

/// A fully wired application ready to serve
pub struct AppServer {
    config: AppConfig,
    state: AppState,
    store: StoreHandle,
    writer: CacheWriter,
    recovery_watch: JoinHandle<()>,
}

impl AppServer {
    /// Build with the in-memory repository
    pub fn build(config: AppConfig, metrics: Option<PrometheusHandle>) -> ApiResult<Self> {
        Self::build_with_repository(config, Arc::new(InMemoryRepository::new()), metrics)
    }

    /// Build around an existing repository; must run inside a Tokio runtime
    pub fn build_with_repository(
        config: AppConfig,
        repository: Arc<dyn MenuRepository>,
        metrics: Option<PrometheusHandle>,
    ) -> ApiResult<Self> {
        let store = match config.cache.backend {
            CacheBackend::Redis if config.cache.enabled => {
                let store = RedisCache::connect(config.cache.redis.clone()).map_err(|e| {
                    ApiError::config(format!("Failed to create Redis client: {}", e))
                })?;
                StoreHandle::Redis(store)
            }
            _ => {
                let store = Arc::new(InMemoryCache::new());
                let _sweeper = store.spawn_sweeper(MEMORY_SWEEP_INTERVAL);
                StoreHandle::Memory(store)
            }
        };

        let keys = KeyGenerator::new(
            config.cache.key_prefix.clone(),
            config.cache.selector_param.clone(),
        );
        let writer = CacheWriter::new();
        let cache = ResponseCache::new(store.as_dyn(), keys.clone(), config.cache.max_payload_bytes)
            .with_writer(writer.clone());
        let invalidator = Invalidator::new(store.as_dyn(), keys);
        let recovery_watch = invalidator.spawn_recovery_watch();

        let state = AppState {
            repository,
            cache,
            invalidator,
            verifier: JwtVerifier::new(&config.auth),
            cache_enabled: config.cache.enabled,
            public_ttl: config.cache.default_ttl,
            metrics,
        };

        info!(
            backend = store.as_dyn().backend_name(),
            enabled = config.cache.enabled,
            ttl_secs = config.cache.default_ttl.as_secs(),
            "🔧 Response cache configured"
        );

        Ok(Self {
            config,
            state,
            store,
            writer,
            recovery_watch,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Router with CORS and tracing layers applied
    pub fn router(&self) -> ApiResult<Router> {
        Ok(api::router(self.state.clone()).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&self.config.server)?),
        ))
    }

    /// Serve on the configured address until SIGINT/SIGTERM
    pub async fn run(self) -> ApiResult<()> {
        let addr = self.config.server.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to bind to {}: {}", addr, e)))?;
        info!("🚀 Menu API listening on {}", addr);

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `signal` resolves, then tear down
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> ApiResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router()?;
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| ApiError::internal(format!("Server error: {}", e)));

        self.shutdown().await;
        result
    }

    /// Drain pending cache writes, then close the store
    pub async fn shutdown(&self) {
        info!("🛑 Shutting down, draining cache writes");
        if !self.writer.drain(self.config.server.shutdown_timeout).await {
            warn!("Some cache writes were abandoned during shutdown");
        }

        self.recovery_watch.abort();
        match &self.store {
            StoreHandle::Redis(store) => store.shutdown().await,
            StoreHandle::Memory(_) => {}
        }
        info!("✅ Shutdown complete");
    }
}

fn cors_layer(config: &ServerConfig) -> ApiResult<CorsLayer> {
    let mut layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([HeaderName::from_static(crate::caching::X_CACHE)]);

    if !config.cors_origins.is_empty() {
        let origins = config
            .cors_origins
            .iter()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .map_err(|e| ApiError::config(format!("Invalid CORS origin '{}': {}", origin, e)))
            })
            .collect::<ApiResult<Vec<_>>>()?;
        layer = layer.allow_origin(origins).allow_credentials(true);
        info!("CORS enabled for {} origins", config.cors_origins.len());
    }

    Ok(layer)
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
