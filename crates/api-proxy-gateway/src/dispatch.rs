//! Authorization gate shared by every target kind.

use std::borrow::Cow;

use axum::body::Body;
use axum::http::{Request, Uri};
use axum::response::Response;

use api_proxy_auth::Gatekeeper;
use api_proxy_core::TargetConfig;
use percent_encoding::percent_decode_str;

use crate::auth::{attach_token, authorization};
use crate::backend::Backend;
use crate::error::ApiError;

/// Authorize a request against the target's policy and forward it.
///
/// The privilege required for the decoded `sub_path` is resolved first, so
/// an encoded spelling of a protected path is held to the same rule. Public paths
/// are forwarded without consulting the gatekeeper. Otherwise the bearer
/// token is checked, the request URI is rewritten to `sub_path` and the
/// effective token is returned in the `token` response header.
///
/// # Errors
///
/// Returns `BadRequest` for paths that cannot be decoded or carry dot
/// segments, `Unauthorized` when the token is missing or insufficient,
/// `Unavailable` when the authentication service cannot be reached and any
/// error raised by the backend.
pub async fn authorize_and_forward(
    config: &TargetConfig,
    gatekeeper: &dyn Gatekeeper,
    sub_path: &str,
    backend: &dyn Backend,
    mut request: Request<Body>,
) -> Result<Response, ApiError> {
    let decoded = policy_path(sub_path)?;
    let required = config
        .privileges
        .resolve(&decoded, request.method().as_str());

    tracing::debug!(
        target_id = %config.id,
        method = %request.method(),
        path = %decoded,
        required,
        "Resolved required privileges"
    );

    let token = if required == 0 {
        String::new()
    } else {
        let presented = authorization(request.headers())?;
        gatekeeper
            .check_access(presented, required, config.updates_token)
            .await
            .map_err(|e| {
                tracing::info!(target_id = %config.id, path = %sub_path, error = %e, "Access denied");
                ApiError::from(e)
            })?
    };

    rewrite_uri(&mut request, sub_path)?;

    let mut response = backend.forward(request).await?;
    attach_token(response.headers_mut(), &token);
    Ok(response)
}

/// Decode `sub_path` into the form path rules are matched against.
///
/// `.` and `..` segments are refused in either spelling: the backend URL
/// join collapses them, so the forwarded path would differ from the one
/// the policy saw.
///
/// # Errors
///
/// Returns `BadRequest` if the path is not valid UTF-8 once decoded or
/// contains a dot segment.
pub fn policy_path(sub_path: &str) -> Result<Cow<'_, str>, ApiError> {
    let decoded = percent_decode_str(sub_path)
        .decode_utf8()
        .map_err(|e| ApiError::BadRequest(format!("invalid request path {sub_path:?}: {e}")))?;

    if decoded.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(ApiError::BadRequest(format!(
            "request path {sub_path:?} contains dot segments"
        )));
    }
    Ok(decoded)
}

/// Replace the request path with `sub_path`, keeping the query string.
///
/// # Errors
///
/// Returns `BadRequest` if the result is not a valid URI.
pub fn rewrite_uri(request: &mut Request<Body>, sub_path: &str) -> Result<(), ApiError> {
    let path_and_query = match request.uri().query() {
        Some(query) => format!("{sub_path}?{query}"),
        None => sub_path.to_string(),
    };

    let uri: Uri = path_and_query
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid request path {sub_path:?}: {e}")))?;
    *request.uri_mut() = uri;
    Ok(())
}
