//! # Redis Cache Store
//!
//! This module provides the Redis-backed [`CacheStore`]. Connection establishment happens on a
//! supervisor task so startup never blocks on Redis: [`RedisCache::connect`] returns at once in
//! the `Connecting` state and the response cache stays bypassed until the first connection
//! succeeds.
//!
//! ## Reconnection Policy
//! Attempt *n* waits `min(n * retry_step, max_retry_delay)` before the next try and every
//! attempt is bounded by `connect_timeout`. After `max_retries` consecutive failures the store
//! is considered exhausted: it stays degraded and the supervisor only reconnects again every
//! `recovery_interval`.
//!
//! ## Failure Handling
//! Each command is bounded by `operation_timeout`. Any failed or timed out command marks the
//! store degraded, which bypasses the cache for subsequent requests and wakes the supervisor to
//! rebuild the connection. Callers never retry inline.

use super::CacheStore;
use crate::caching::health::{CacheHealth, Readiness};
use crate::caching::{CacheError, CacheResult};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Redis cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisCacheConfig {
    /// Redis connection URL
    pub url: String,

    /// Upper bound for a single connection attempt
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Upper bound for a single command
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Consecutive failed attempts before the store is considered exhausted
    pub max_retries: u32,

    /// Linear backoff step between attempts
    #[serde(with = "humantime_serde")]
    pub retry_step: Duration,

    /// Backoff ceiling
    #[serde(with = "humantime_serde")]
    pub max_retry_delay: Duration,

    /// Reconnect interval once retries are exhausted
    #[serde(with = "humantime_serde")]
    pub recovery_interval: Duration,

    /// `COUNT` hint for `SCAN`
    pub scan_count: usize,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(1),
            max_retries: 10,
            retry_step: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(3),
            recovery_interval: Duration::from_secs(30),
            scan_count: 1000,
        }
    }
}

impl RedisCacheConfig {
    /// Check the URL parses and the timeouts are usable
    pub fn validate(&self) -> CacheResult<()> {
        Client::open(self.url.as_str())?;

        if self.connect_timeout.is_zero() || self.operation_timeout.is_zero() {
            return Err(CacheError::Configuration {
                message: "redis timeouts must be non-zero".to_string(),
            });
        }

        if self.max_retries == 0 {
            return Err(CacheError::Configuration {
                message: "redis max_retries must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_step
            .saturating_mul(attempt)
            .min(self.max_retry_delay)
    }
}

/// Redis cache implementation
pub struct RedisCache {
    /// Configuration
    config: RedisCacheConfig,

    /// Current connection, `None` until the supervisor establishes one
    connection: Arc<RwLock<Option<ConnectionManager>>>,

    /// Readiness shared with the interceptor and invalidator
    health: CacheHealth,

    /// Stops the supervisor on shutdown
    shutdown: CancellationToken,
}

impl RedisCache {
    /// Create the store and start connecting in the background
    pub fn connect(config: RedisCacheConfig) -> CacheResult<Arc<Self>> {
        let client = Client::open(config.url.as_str())?;

        let cache = Arc::new(Self {
            config: config.clone(),
            connection: Arc::new(RwLock::new(None)),
            health: CacheHealth::new(),
            shutdown: CancellationToken::new(),
        });

        let supervisor = Supervisor {
            client,
            config,
            connection: cache.connection.clone(),
            health: cache.health.clone(),
            shutdown: cache.shutdown.clone(),
        };
        tokio::spawn(supervisor.run());

        info!("📡 Redis cache connecting to {}", cache.config.url);
        Ok(cache)
    }

    /// Stop the supervisor and drop the connection
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.connection.write().await.take();
        info!("Redis cache connection closed");
    }

    /// Run one command against the current connection with the per-call timeout.
    ///
    /// Failures degrade the store; they are never retried here.
    async fn execute<T, F, Fut>(&self, operation: &'static str, command: F) -> CacheResult<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        if !self.health.is_ready() {
            return Err(CacheError::Unavailable);
        }

        let conn = self
            .connection
            .read()
            .await
            .clone()
            .ok_or(CacheError::Unavailable)?;

        match tokio::time::timeout(self.config.operation_timeout, command(conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.record_failure(operation, &e.to_string());
                Err(CacheError::Redis(e))
            }
            Err(_) => {
                self.record_failure(operation, "operation timed out");
                Err(CacheError::Timeout)
            }
        }
    }

    fn record_failure(&self, operation: &'static str, reason: &str) {
        metrics::counter!("cache_store_errors_total", "operation" => operation).increment(1);
        error!(operation, reason, "Redis operation failed");
        self.health
            .mark_degraded(format!("redis {} failed: {}", operation, reason));
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let value = self
            .execute("get", |mut conn| async move {
                conn.get::<_, Option<Vec<u8>>>(key).await
            })
            .await?;

        debug!(key, hit = value.is_some(), "Redis lookup");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        // SETEX rejects a zero expiry
        let ttl_seconds = ttl.as_secs().max(1);

        self.execute("set", |mut conn| async move {
            conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await
        })
        .await?;

        debug!("Set Redis cache key: {} with TTL: {}s", key, ttl_seconds);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let count = self.config.scan_count;

        let mut keys = self
            .execute("keys", |mut conn| async move {
                let mut cursor: u64 = 0;
                let mut all_keys = Vec::new();

                loop {
                    let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(count)
                        .query_async(&mut conn)
                        .await?;

                    all_keys.extend(batch);

                    if next_cursor == 0 {
                        break;
                    }
                    cursor = next_cursor;
                }

                Ok::<Vec<String>, redis::RedisError>(all_keys)
            })
            .await?;

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        self.execute("delete", |mut conn| async move {
            conn.del::<_, u64>(keys).await
        })
        .await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let result = self
            .execute("ping", |mut conn| async move {
                redis::cmd("PING").query_async::<_, String>(&mut conn).await
            })
            .await;

        match result {
            Ok(response) => Ok(response == "PONG"),
            Err(_) => Ok(false),
        }
    }

    fn health(&self) -> &CacheHealth {
        &self.health
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Background task owning connection establishment
struct Supervisor {
    client: Client,
    config: RedisCacheConfig,
    connection: Arc<RwLock<Option<ConnectionManager>>>,
    health: CacheHealth,
    shutdown: CancellationToken,
}

impl Supervisor {
    async fn run(self) {
        let mut state = self.health.subscribe();

        loop {
            if !self.establish().await {
                return;
            }

            // Sleep until an operation reports a failure
            loop {
                if *state.borrow_and_update() == Readiness::Degraded {
                    break;
                }
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    changed = state.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }

            warn!("⚡ Redis reconnecting...");
        }
    }

    /// Connect with backoff; returns false if cancelled
    async fn establish(&self) -> bool {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.try_connect().await {
                Ok(manager) => {
                    *self.connection.write().await = Some(manager);
                    self.health.mark_ready();
                    return true;
                }
                Err(reason) => {
                    warn!(attempt, reason = %reason, "⚡ Redis connection attempt failed");
                }
            }

            let delay = if attempt >= self.config.max_retries {
                error!(
                    attempts = attempt,
                    "❌ Redis reconnection attempts exhausted, probing every {:?}",
                    self.config.recovery_interval
                );
                self.health.mark_degraded(format!(
                    "redis unreachable after {} attempts",
                    attempt
                ));
                attempt = 0;
                self.config.recovery_interval
            } else {
                self.config.backoff_delay(attempt)
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn try_connect(&self) -> Result<ConnectionManager, String> {
        let connect = async {
            let mut manager = ConnectionManager::new(self.client.clone()).await?;
            redis::cmd("PING")
                .query_async::<_, String>(&mut manager)
                .await?;
            Ok::<_, redis::RedisError>(manager)
        };

        match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(manager)) => Ok(manager),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("connect timed out".to_string()),
        }
    }
}
