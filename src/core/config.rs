//! # Configuration Module
//!
//! Configuration for the menu API is read in three layers, each overriding the previous one:
//!
//! 1. Built-in defaults (`AppConfig::default()`)
//! 2. An optional YAML file (`config/app.yaml` unless `APP_CONFIG_PATH` says otherwise)
//! 3. Environment variables (`PORT`, `REDIS_URL`, `JWT_SECRET`, `CORS_ORIGIN`, ...)
//!
//! After the overrides are applied the whole structure is validated once, so the rest of the
//! application can trust the values it is handed.
//!
//! ## Durations
//! Every duration field uses `humantime_serde`, so YAML can say `ttl: 60s` or
//! `operation_timeout: 250ms` instead of raw integers.

use crate::caching::stores::RedisCacheConfig;
use crate::core::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Default location of the YAML configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/app.yaml";

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener and CORS settings
    pub server: ServerConfig,

    /// Response cache settings
    pub cache: CacheConfig,

    /// Admin authentication settings
    pub auth: AuthConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Origins allowed by CORS; empty means same-origin only
    pub cors_origins: Vec<String>,

    /// How long shutdown waits for in-flight cache writes
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            cors_origins: Vec::new(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Socket address assembled from `host` and `port`
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ApiError::config(format!("Invalid bind address: {}", e)))
    }
}

/// Which store backs the response cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Remote Redis server
    Redis,
    /// Process-local store, useful for development and tests
    Memory,
}

impl std::str::FromStr for CacheBackend {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(ApiError::config(format!("Unknown cache backend: {}", other))),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch; when off the interceptor is never installed
    pub enabled: bool,

    /// Backing store
    pub backend: CacheBackend,

    /// Namespace prepended to every key
    pub key_prefix: String,

    /// Query parameter that scopes responses to a tenant
    pub selector_param: String,

    /// TTL used by the public read routes
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Responses larger than this are forwarded without being stored
    pub max_payload_bytes: usize,

    /// Redis connection settings
    pub redis: RedisCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Redis,
            key_prefix: "cache:".to_string(),
            selector_param: "restaurant_id".to_string(),
            default_ttl: Duration::from_secs(60),
            max_payload_bytes: 1024 * 1024,
            redis: RedisCacheConfig::default(),
        }
    }
}

/// JWT authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to verify admin tokens
    pub jwt_secret: String,

    /// Role claim required for admin routes
    pub required_role: String,

    /// Allowed clock skew when checking `exp`, in seconds
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            required_role: "admin".to_string(),
            leeway_seconds: 30,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub filter: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "qarmenu_api=info,tower_http=info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional YAML file, then apply environment overrides.
    ///
    /// A missing file is not an error: defaults plus environment are a valid configuration
    /// (this is how container deployments usually run).
    pub async fn load<P: AsRef<Path>>(path: P) -> ApiResult<Self> {
        let path = path.as_ref();
        let mut config = match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                info!("Loading configuration from {}", path.display());
                Self::from_yaml(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                return Err(ApiError::config(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text without applying overrides
    pub fn from_yaml(content: &str) -> ApiResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| ApiError::config(format!("Failed to parse config: {}", e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> ApiResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ApiResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| ApiError::config(format!("Invalid PORT: {}", e)))?;
        }

        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }

        if let Some(origins) = lookup("CORS_ORIGIN") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(url) = lookup("REDIS_URL") {
            self.cache.redis.url = url;
        }

        if let Some(backend) = lookup("CACHE_BACKEND") {
            self.cache.backend = backend.parse()?;
        }

        if let Some(enabled) = lookup("CACHE_ENABLED") {
            self.cache.enabled = enabled
                .parse()
                .map_err(|e| ApiError::config(format!("Invalid CACHE_ENABLED: {}", e)))?;
        }

        if let Some(ttl) = lookup("CACHE_TTL") {
            self.cache.default_ttl = humantime::parse_duration(&ttl)
                .map_err(|e| ApiError::config(format!("Invalid CACHE_TTL: {}", e)))?;
        }

        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(ApiError::config(format!("Invalid LOG_FORMAT: {}", other)))
                }
            };
        }

        Ok(())
    }

    /// Validate the assembled configuration
    pub fn validate(&self) -> ApiResult<()> {
        self.server.bind_addr()?;

        if self.auth.jwt_secret.is_empty() {
            return Err(ApiError::config("JWT secret must be set (JWT_SECRET)"));
        }

        if self.cache.key_prefix.is_empty() {
            return Err(ApiError::config("cache.key_prefix cannot be empty"));
        }

        if self.cache.selector_param.is_empty() {
            return Err(ApiError::config("cache.selector_param cannot be empty"));
        }

        // SETEX rejects a zero expiry
        if self.cache.default_ttl.as_secs() == 0 {
            return Err(ApiError::config("cache.default_ttl must be at least one second"));
        }

        if self.cache.enabled && self.cache.backend == CacheBackend::Redis {
            self.cache
                .redis
                .validate()
                .map_err(|e| ApiError::config(format!("Invalid redis settings: {}", e)))?;
        }

        Ok(())
    }
}
