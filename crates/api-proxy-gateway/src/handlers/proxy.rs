//! Proxy endpoints.
//!
//! `/api/{id}/...` accepts any method and `/ws/{id}/...` accepts WebSocket
//! upgrades. Everything after the target identifier is handed to the
//! target as its sub-path.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::Request;
use axum::response::Response;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Path parameters of proxy routes.
#[derive(Debug, Deserialize)]
pub struct TargetPath {
    /// Target identifier.
    pub id: String,
}

/// Dispatch a request to the target named in the path.
///
/// # Errors
///
/// Returns `NotFound` for unknown targets and any authorization or
/// forwarding error.
pub async fn proxy(
    State(state): State<Arc<GatewayState>>,
    Path(TargetPath { id }): Path<TargetPath>,
    request: Request<Body>,
) -> Result<Response, ApiError> {
    let sub_path = sub_path(request.uri().path());
    state.registry.dispatch(&id, &sub_path, request).await
}

/// Strip the route prefix and target segment from a raw request path.
///
/// `/api/catalog/catalog/templates` becomes `/catalog/templates`; a request
/// naming only the target yields `/`.
pub(crate) fn sub_path(path: &str) -> String {
    let mut segments = path.trim_start_matches('/').splitn(3, '/');
    segments.next();
    segments.next();
    format!("/{}", segments.next().unwrap_or_default())
}
