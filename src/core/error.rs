//! # Error Handling Module
//!
//! This module defines the HTTP-facing error type for the menu API using the `thiserror` crate.
//! Every error that can reach a client is a variant of [`ApiError`], and each variant maps to
//! exactly one HTTP status code.
//!
//! ## Where Cache Errors Fit
//!
//! Cache failures are deliberately *not* represented here. The caching layer has its own
//! [`CacheError`](crate::caching::CacheError) type which is recovered inside the caching module
//! (logged, counted, turned into a miss or a no-op). A cache fault can make a request slower but
//! it can never change the status code a client sees, so there is no `ApiError::Cache` variant
//! for a handler to accidentally return.
//!
//! ## Rust Error Handling Concepts
//!
//! - `Result<T, ApiError>` is returned by every fallible handler; `?` propagates early
//! - `From` implementations let `?` convert library errors (`serde_json`, `jsonwebtoken`, ...)
//! - `IntoResponse` lets axum turn an `Err(ApiError)` straight into an HTTP response

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::convert::Infallible;
use thiserror::Error;

use crate::storage::RepositoryError;

/// Main result type used by handlers and startup code
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that can be reported to API clients
#[derive(Debug, Error, Clone)]
pub enum ApiError {
    /// Configuration-related errors (invalid config, missing files, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Missing, malformed or expired credentials
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    /// Authenticated caller lacks the required role or ownership
    #[error("Authorization failed: {reason}")]
    Authorization { reason: String },

    /// Requested entity does not exist
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Request validation errors (missing parameters, malformed body, etc.)
    #[error("Request validation failed: {field} - {reason}")]
    RequestValidation { field: String, reason: String },

    /// Internal server errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// I/O errors (file operations, socket binding, etc.)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },

    /// JWT token validation errors
    #[error("JWT error: {message}")]
    Jwt { message: String },
}

impl ApiError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error with a custom reason
    pub fn auth<S: Into<String>>(reason: S) -> Self {
        Self::Authentication {
            reason: reason.into(),
        }
    }

    /// Create an authorization error with a custom reason
    pub fn authz<S: Into<String>>(reason: S) -> Self {
        Self::Authorization {
            reason: reason.into(),
        }
    }

    /// Create a not found error for the named resource
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a validation error for a specific field
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, reason: S) -> Self {
        Self::RequestValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::Authorization { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::RequestValidation { .. } => StatusCode::BAD_REQUEST,
            Self::Json { .. } => StatusCode::BAD_REQUEST,
            Self::Jwt { .. } => StatusCode::UNAUTHORIZED,
            Self::Configuration { .. }
            | Self::Internal { .. }
            | Self::Io { .. }
            | Self::Yaml { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a string representation of the error type for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Authentication { .. } => "authentication_error",
            Self::Authorization { .. } => "authorization_error",
            Self::NotFound { .. } => "not_found",
            Self::RequestValidation { .. } => "request_validation_error",
            Self::Internal { .. } => "internal_error",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
            Self::Jwt { .. } => "jwt_error",
        }
    }
}

impl From<Infallible> for ApiError {
    fn from(infallible: Infallible) -> Self {
        match infallible {}
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ApiError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::auth("token expired"),
            _ => Self::Jwt {
                message: err.to_string(),
            },
        }
    }
}

/// Repository failures surface as 404/403/400/500 depending on the cause
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                Self::not_found(format!("{} {}", entity, id))
            }
            RepositoryError::OwnershipMismatch { entity, id } => Self::authz(format!(
                "not authorized to modify {} {}",
                entity, id
            )),
            RepositoryError::Conflict { message } => Self::validation("body", message),
            RepositoryError::Unavailable { message } => Self::internal(message),
        }
    }
}

/// Converts errors into a structured JSON body with the mapped status code
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status, Json(error_response)).into_response()
    }
}
