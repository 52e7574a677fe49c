//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{any, delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, pools, proxy};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Pools
/// - `POST /pool` - Create pool
/// - `GET /pool/{pool_id}` - Describe pool
/// - `DELETE /pool/{pool_id}` - Delete pool
/// - `POST /pool/{pool_id}` - Add member
/// - `DELETE /pool/{pool_id}/{member_id}` - Remove member
///
/// ## Proxy
/// - `ANY /api/{id}/{*path}` - HTTP dispatch
/// - `GET /ws/{id}/{*path}` - WebSocket dispatch
pub fn create_router(state: GatewayState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let cors = build_cors_layer(&cors_origins);
    let state = Arc::new(state);

    let control = Router::new()
        .route("/pool", post(pools::create_pool))
        .route(
            "/pool/{pool_id}",
            get(pools::get_pool)
                .post(pools::add_member)
                .delete(pools::delete_pool),
        )
        .route("/pool/{pool_id}/{member_id}", delete(pools::remove_member))
        .layer(RequestBodyLimitLayer::new(max_body_bytes));

    let api = Router::new()
        .route("/api/{id}", any(proxy::proxy))
        .route("/api/{id}/{*path}", any(proxy::proxy))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ));

    // No timeout: upgraded sessions outlive the handshake request.
    let ws = Router::new()
        .route("/ws/{id}", get(proxy::proxy))
        .route("/ws/{id}/{*path}", get(proxy::proxy));

    Router::new()
        .route("/health", get(health::health))
        .merge(control)
        .merge(api)
        .merge(ws)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
