//! Pool management endpoints.
//!
//! Pools are created empty and filled by registering members one at a time.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use api_proxy_core::{Privileges, Protocol, TargetConfig};

use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to create a pool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoolBody {
    /// Pool identifier.
    pub id: String,
    /// Protocol spoken by the pool members.
    #[serde(default)]
    pub protocol: Protocol,
    /// Privilege level required on every path.
    #[serde(default)]
    pub privileges_level: u32,
    /// Whether tokens are rotated on each check.
    #[serde(default)]
    pub updates_token: bool,
}

/// Request to add a member to a pool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberBody {
    /// Member identifier, used as the first path segment of pool requests.
    pub target_id: String,
    /// Member backend URL.
    pub target_uri: String,
}

/// Response describing a pool.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolResponse {
    /// Pool identifier.
    pub id: String,
    /// Protocol spoken by the pool members.
    pub protocol: Protocol,
    /// Default privilege level.
    pub privileges_level: u32,
    /// Whether tokens are rotated on each check.
    pub updates_token: bool,
    /// Member identifiers, sorted.
    pub members: Vec<String>,
}

impl PoolResponse {
    fn new(config: &TargetConfig, members: Vec<String>) -> Self {
        Self {
            id: config.id.clone(),
            protocol: config.protocol,
            privileges_level: config.privileges.default,
            updates_token: config.updates_token,
            members,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Create an empty pool.
///
/// # Errors
///
/// Returns `BadRequest` for an empty identifier and `Conflict` if the
/// identifier is already registered.
pub async fn create_pool(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<CreatePoolBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.id.is_empty() || body.id.contains('/') {
        return Err(ApiError::BadRequest(
            "id must be non-empty and must not contain '/'".to_string(),
        ));
    }

    let config = TargetConfig::pool(body.id, body.protocol)
        .with_privileges(Privileges::with_default(body.privileges_level))
        .with_token_rotation(body.updates_token);

    let target = state.registry.create_pool(config)?;

    Ok((
        StatusCode::CREATED,
        Json(PoolResponse::new(target.config(), Vec::new())),
    ))
}

/// Describe a pool and list its members.
///
/// # Errors
///
/// Returns `NotFound` for unknown pools and `InvalidType` for single targets.
pub async fn get_pool(
    State(state): State<Arc<GatewayState>>,
    Path(pool_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let members = state.registry.pool_members(&pool_id)?;
    let target = state
        .registry
        .get(&pool_id)
        .ok_or_else(|| ApiError::NotFound(format!("target {pool_id}")))?;

    Ok(Json(PoolResponse::new(target.config(), members)))
}

/// Delete a pool.
///
/// # Errors
///
/// Returns `NotFound` for unknown pools and `InvalidType` for single targets.
pub async fn delete_pool(
    State(state): State<Arc<GatewayState>>,
    Path(pool_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.registry.remove_pool(&pool_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a member to a pool.
///
/// # Errors
///
/// Returns `NotFound` for unknown pools, `InvalidType` for single targets
/// and `BadRequest` for an invalid member identifier or URL.
pub async fn add_member(
    State(state): State<Arc<GatewayState>>,
    Path(pool_id): Path<String>,
    Json(body): Json<AddMemberBody>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .registry
        .add_to_pool(&pool_id, &body.target_id, &body.target_uri)?;

    let members = state.registry.pool_members(&pool_id)?;
    Ok(Json(serde_json::json!({
        "id": pool_id,
        "targetId": body.target_id,
        "targetUri": body.target_uri,
        "members": members,
    })))
}

/// Remove a member from a pool.
///
/// # Errors
///
/// Returns `NotFound` for unknown pools and `InvalidType` for single targets.
pub async fn remove_member(
    State(state): State<Arc<GatewayState>>,
    Path((pool_id, member_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.registry.remove_from_pool(&pool_id, &member_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_defaults() {
        let body: CreatePoolBody = serde_json::from_str(r#"{"id":"sockets"}"#).unwrap();
        assert_eq!(body.protocol, Protocol::Http);
        assert_eq!(body.privileges_level, 0);
        assert!(!body.updates_token);
    }

    #[test]
    fn create_body_uses_camel_case() {
        let body: CreatePoolBody = serde_json::from_str(
            r#"{"id":"sockets","protocol":"WS","privilegesLevel":3,"updatesToken":true}"#,
        )
        .unwrap();
        assert_eq!(body.protocol, Protocol::WebSocket);
        assert_eq!(body.privileges_level, 3);
        assert!(body.updates_token);
    }

    #[test]
    fn pool_response_shape() {
        let config = TargetConfig::pool("sockets", Protocol::WebSocket)
            .with_privileges(Privileges::with_default(4));
        let json = serde_json::to_value(PoolResponse::new(&config, vec!["ws1".into()])).unwrap();

        assert_eq!(json["id"], "sockets");
        assert_eq!(json["protocol"], "WS");
        assert_eq!(json["privilegesLevel"], 4);
        assert_eq!(json["members"][0], "ws1");
    }
}
