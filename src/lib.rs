//! # QR Menu API - Core Library Crate
//!
//! REST backend for restaurant menus with a Redis cache-aside layer in front of the public
//! read endpoints. The binary in `main.rs` only loads configuration and hands over to
//! [`server::AppServer`]; everything else lives here so integration tests can drive the full
//! router in-process.
//!
//! ## Module Map
//! - [`caching`]: key derivation, read interceptor, invalidation, degradation, stores
//! - [`api`]: route assembly and handlers
//! - [`auth`]: admin JWT verification
//! - [`storage`]: entities and the repository trait
//! - [`core`]: configuration and the HTTP-facing error type
//! - [`observability`]: logging and metrics setup
//! - [`server`]: wiring and lifecycle

/// Configuration and error types shared by every other module
pub mod core;

/// Response caching: the part of the system with real design tension
pub mod caching;

/// HTTP routes and handlers
pub mod api;

/// Admin authentication
pub mod auth;

/// Persistence abstraction and the in-memory implementation
pub mod storage;

/// Logging and metrics initialization
pub mod observability;

/// Application wiring, serving and shutdown
pub mod server;

pub use crate::core::config::AppConfig;
pub use crate::core::error::{ApiError, ApiResult};
pub use crate::server::AppServer;
