//! Bearer token handling.
//!
//! Tokens are read from the `Authorization` header and the effective token
//! returned by the gatekeeper travels back to the client in the `token`
//! response header.

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};

use crate::error::ApiError;

/// Response header carrying the effective, possibly rotated, token.
pub const TOKEN_HEADER: &str = "token";

/// Strip an optional `Bearer ` prefix.
///
/// Bare tokens are accepted as well.
#[must_use]
pub fn extract_token(header: &str) -> &str {
    header.strip_prefix("Bearer ").unwrap_or(header)
}

/// Read the token from the `Authorization` header.
///
/// # Errors
///
/// Returns `Unauthorized` if the header is absent, empty or not valid text.
pub fn authorization(headers: &HeaderMap) -> Result<&str, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(extract_token)
        .unwrap_or_default();

    if token.is_empty() {
        return Err(ApiError::unauthorized("authorization required"));
    }
    Ok(token)
}

/// Set the `token` header on a response.
///
/// Empty tokens and values that are not valid header text are skipped.
pub fn attach_token(headers: &mut HeaderMap, token: &str) {
    if token.is_empty() {
        return;
    }
    match HeaderValue::from_str(token) {
        Ok(value) => {
            headers.insert(TOKEN_HEADER, value);
        }
        Err(e) => tracing::warn!(error = %e, "Issued token is not a valid header value"),
    }
}
