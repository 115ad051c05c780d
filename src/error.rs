//! HTTP error mapping.
//!
//! `ApiError` implements `IntoResponse` so handlers can return
//! `ApiResult<T>` and use `?` on db and validation results.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::validation::RuleViolation;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// 401
    Unauthorized(String),
    /// 403
    Forbidden(String),
    /// 404
    NotFound(String),
    /// 400
    BadRequest(String),
    /// 405
    MethodNotAllowed,
    /// 409, e.g. a duplicate indicator code
    Conflict(String),
    /// 422, one entry per failed rule
    Invalid(Vec<String>),
    /// 500
    Internal(String),
}

impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn invalid(violations: &[RuleViolation]) -> Self {
        Self::Invalid(violations.iter().map(ToString::to_string).collect())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("unauthorized", msg),
            ),
            ApiError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, ErrorResponse::new("forbidden", msg))
            }
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("not_found", format!("{resource} not found")),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("bad_request", msg),
            ),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorResponse::new("method_not_allowed", "method not allowed on this route"),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse::new("conflict", msg)),
            ApiError::Invalid(details) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("validation_failed", "one or more rules failed")
                    .with_details(details),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("internal_error", msg),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized(m) => write!(f, "Unauthorized: {m}"),
            ApiError::Forbidden(m) => write!(f, "Forbidden: {m}"),
            ApiError::NotFound(r) => write!(f, "Not found: {r}"),
            ApiError::BadRequest(m) => write!(f, "Bad request: {m}"),
            ApiError::MethodNotAllowed => write!(f, "Method not allowed"),
            ApiError::Conflict(m) => write!(f, "Conflict: {m}"),
            ApiError::Invalid(d) => write!(f, "Validation failed: {}", d.join("; ")),
            ApiError::Internal(m) => write!(f, "Internal error: {m}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::WeakPassword => ApiError::Invalid(vec![err.to_string()]),
            AuthError::Hashing(_) => {
                tracing::error!(error = %err, "password hashing failed");
                ApiError::Internal("unexpected server error".to_string())
            }
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(message) = crate::db::unique_violation(&err) {
            return ApiError::Conflict(message);
        }
        tracing::error!(error = %format!("{err:#}"), "request failed");
        ApiError::Internal("unexpected server error".to_string())
    }
}

/// Malformed JSON is a 400; well-formed JSON of the wrong shape is a 422.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY {
            ApiError::Invalid(vec![rejection.body_text()])
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
