//! # Cache Stores Module
//!
//! This module provides the cache store abstraction and its two implementations:
//! a Redis-backed store for production and an in-memory store for development and tests.
//!
//! Both implement the same contract: `get`, `set` with a TTL, glob-pattern key enumeration,
//! bulk delete, and a readiness predicate. All operations are fallible and callers treat any
//! failure as "cache unavailable", never as a request failure.

pub mod memory;
pub mod redis_store;

pub use memory::InMemoryCache;
pub use redis_store::{RedisCache, RedisCacheConfig};

use super::health::CacheHealth;
use super::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Trait for cache store implementations
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value from the cache
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set a value in the cache with TTL
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// List keys matching a Redis-style glob pattern
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Delete the given keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> CacheResult<u64>;

    /// Perform an active health check against the backend
    async fn health_check(&self) -> CacheResult<bool>;

    /// Health state shared with the rest of the caching layer
    fn health(&self) -> &CacheHealth;

    /// Short backend name for logs and admin output
    fn backend_name(&self) -> &'static str;

    /// Whether operations should be attempted right now
    fn is_ready(&self) -> bool {
        self.health().is_ready()
    }
}

/// Match `key` against a Redis glob pattern.
///
/// Supports `*`, `?`, `[...]` classes (with `^` negation and `a-z` ranges) and `\` escapes,
/// the subset of `SCAN MATCH` syntax the key generator emits.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    glob_match_at(&pattern, &key)
}

fn glob_match_at(pattern: &[char], key: &[char]) -> bool {
    let (mut p, mut k) = (0, 0);
    // position of the last `*` and the key index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    backtrack = Some((p, k));
                    p += 1;
                    continue;
                }
                '?' => {
                    p += 1;
                    k += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(pattern, p, key[k]) {
                        if matched {
                            p = next;
                            k += 1;
                            continue;
                        }
                    } else if key[k] == '[' {
                        p += 1;
                        k += 1;
                        continue;
                    }
                }
                '\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == key[k] {
                        p += 2;
                        k += 1;
                        continue;
                    }
                }
                c => {
                    if c == key[k] {
                        p += 1;
                        k += 1;
                        continue;
                    }
                }
            }
        }

        match backtrack {
            Some((star, star_k)) => {
                p = star + 1;
                k = star_k + 1;
                backtrack = Some((star, star_k + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Evaluate a `[...]` class starting at `start`; returns (matched, index after `]`)
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negated = pattern.get(i) == Some(&'^');
    if negated {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != ']' {
        let mut lo = pattern[i];
        if lo == '\\' && i + 1 < pattern.len() {
            i += 1;
            lo = pattern[i];
        }

        if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let hi = pattern[i + 2];
            if lo <= c && c <= hi {
                matched = true;
            }
            i += 3;
        } else {
            if lo == c {
                matched = true;
            }
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }

    Some((matched != negated, i + 1))
}
