//! # Authentication Middleware
//!
//! `require_admin` guards every admin route. On success the [`AdminContext`] is stored in the
//! request extensions; on failure the [`ApiError`] is rendered directly (401 or 403).

use super::{AdminContext, JwtVerifier};
use crate::core::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

/// Axum middleware function for admin authentication
pub async fn require_admin(
    State(verifier): State<JwtVerifier>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context: AdminContext = match verifier.authenticate(request.headers()) {
        Ok(context) => context,
        Err(err) => {
            warn!(path = %request.uri().path(), error = %err, "Admin authentication failed");
            return Err(err);
        }
    };

    debug!(admin = %context.username, "Admin authenticated");
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
