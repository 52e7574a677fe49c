//! Error types and responses.
//!
//! [`ProxyError`] is raised by the registry and the targets it owns.
//! [`ApiError`] is what handlers return; it renders the standard error body
//! and, for authorization failures, still carries any token the
//! authentication service issued.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use api_proxy_auth::AuthError;
use api_proxy_core::TargetKind;

use crate::auth::TOKEN_HEADER;

/// A result type using `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Errors raised while building targets or mutating the registry.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No target is registered under the identifier.
    #[error("target not found: {0}")]
    TargetNotFound(String),

    /// The pool has no member with the identifier.
    #[error("member {member_id} not found in pool {pool_id}")]
    MemberNotFound {
        /// The pool that was searched.
        pool_id: String,
        /// The missing member.
        member_id: String,
    },

    /// A target with the identifier already exists.
    #[error("target already exists: {0}")]
    Conflict(String),

    /// The identifier resolves to a target of the wrong kind.
    #[error("target {id} is a {actual} target, expected {expected}")]
    InvalidType {
        /// The target identifier.
        id: String,
        /// The kind the operation requires.
        expected: TargetKind,
        /// The kind actually registered.
        actual: TargetKind,
    },

    /// A backend URL could not be parsed.
    #[error("invalid backend URL {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A pool member identifier cannot be routed to.
    #[error("invalid member identifier {0:?}")]
    InvalidMemberId(String),

    /// A pool request did not name a member.
    #[error("request to pool {0} does not name a member")]
    MissingMember(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::TargetNotFound(_) | Self::MemberNotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::InvalidType { .. }
            | Self::InvalidUrl { .. }
            | Self::InvalidMemberId(_)
            | Self::MissingMember(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, invalid or insufficient token.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Error detail.
        message: String,
        /// Token issued by the authentication service despite the failure.
        token: Option<String>,
    },

    /// The requested target or pool member was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request conflicts with the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation does not apply to the target's kind.
    #[error("invalid target type: {0}")]
    InvalidType(String),

    /// Invalid request body, path or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request body exceeds the configured limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The backend could not be reached.
    #[error("bad gateway: {0}")]
    BadGateway(String),

    /// The authentication service could not be reached.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// An unauthorized error without an issued token.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            token: None,
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidType(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidType(_) => "invalid_type",
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::BadGateway(_) => "bad_gateway",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let token = match self {
            Self::Unauthorized { token, .. } => token,
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };
        let mut response = (status, Json(body)).into_response();

        if let Some(value) = token.and_then(|t| HeaderValue::from_str(&t).ok()) {
            response.headers_mut().insert(TOKEN_HEADER, value);
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => Self::unauthorized(err.to_string()),
            AuthError::Rejected { .. } => {
                Self::unauthorized(format!("invalid access token: {err}"))
            }
            AuthError::InsufficientPrivileges { .. } => Self::Unauthorized {
                message: err.to_string(),
                token: err.issued_token().map(str::to_owned),
            },
            AuthError::Unavailable(_) => {
                tracing::error!(error = %err, "Authentication service unavailable");
                Self::Unavailable("authentication service unavailable".to_string())
            }
            AuthError::InvalidResponse(_) | AuthError::Internal(_) => {
                tracing::error!(error = %err, "Auth internal error");
                Self::Internal("authentication service error".to_string())
            }
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::TargetNotFound(id) => Self::NotFound(format!("target {id}")),
            ProxyError::MemberNotFound { pool_id, member_id } => {
                Self::NotFound(format!("member {member_id} in pool {pool_id}"))
            }
            ProxyError::Conflict(id) => Self::Conflict(format!("target {id} already exists")),
            ProxyError::InvalidType { .. } => Self::InvalidType(err.to_string()),
            ProxyError::InvalidUrl { .. }
            | ProxyError::InvalidMemberId(_)
            | ProxyError::MissingMember(_) => Self::BadRequest(err.to_string()),
            ProxyError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                Self::Internal(msg)
            }
        }
    }
}
