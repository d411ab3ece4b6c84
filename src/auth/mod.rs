//! # Authentication Module
//!
//! Admin routes accept a `Bearer` JWT signed with the shared HS256 secret. Tokens are issued
//! elsewhere; this module only verifies them, checks the role claim and hands the resulting
//! [`AdminContext`] to handlers through request extensions.

pub mod middleware;

pub use middleware::require_admin;

use crate::core::config::AuthConfig;
use crate::core::error::{ApiError, ApiResult};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Claims carried by admin tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub restaurant_id: Option<i64>,
    pub role: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Authenticated admin, available to handlers as `Extension<AdminContext>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminContext {
    pub admin_id: i64,
    pub username: String,
    pub restaurant_id: Option<i64>,
}

/// Verifies admin tokens
#[derive(Clone)]
pub struct JwtVerifier {
    inner: Arc<VerifierInner>,
}

struct VerifierInner {
    decoding_key: DecodingKey,
    validation: Validation,
    required_role: String,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            inner: Arc::new(VerifierInner {
                decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
                validation,
                required_role: config.required_role.clone(),
            }),
        }
    }

    /// Decode and validate a raw token
    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        let data = decode::<Claims>(token, &self.inner.decoding_key, &self.inner.validation)?;
        Ok(data.claims)
    }

    /// Check the role claim
    pub fn authorize(&self, claims: Claims) -> ApiResult<AdminContext> {
        if claims.role != self.inner.required_role {
            return Err(ApiError::authz(format!(
                "role '{}' may not access admin routes",
                claims.role
            )));
        }

        Ok(AdminContext {
            admin_id: claims.id,
            username: claims.username,
            restaurant_id: claims.restaurant_id,
        })
    }

    /// Full check of an `Authorization` header
    pub fn authenticate(&self, headers: &HeaderMap) -> ApiResult<AdminContext> {
        let token = bearer_token(headers)?;
        let claims = self.verify(token)?;
        self.authorize(claims)
    }
}

fn bearer_token(headers: &HeaderMap) -> ApiResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::auth("missing Authorization header"))?
        .to_str()
        .map_err(|_| ApiError::auth("malformed Authorization header"))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::auth("expected a Bearer token"))
}
