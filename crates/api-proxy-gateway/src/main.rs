//! api-proxy - authenticating HTTP/WebSocket reverse proxy
//!
//! This is the main entry point for the gateway service.
//!
//! # Configuration
//!
//! - `LISTEN_ADDR`: listen address (default `0.0.0.0:8080`)
//! - `AUTH_BASE_URL`: authentication service base URL (default `http://auth`)
//! - `AUTH_TIMEOUT_SECONDS`: token check timeout (default 10)
//! - `TARGETS_CONFIG`: path of the YAML target list (default `targets.yaml`)

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_proxy_auth::{AuthConfig, HttpGatekeeper};
use api_proxy_gateway::{
    create_router, BackendFactory, GatewayConfig, GatewayState, ProxyConfig, TargetRegistry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api_proxy=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting api-proxy");

    // Load configuration from environment
    let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let auth_base_url = std::env::var("AUTH_BASE_URL").unwrap_or_else(|_| "http://auth".into());
    let auth_timeout_seconds = std::env::var("AUTH_TIMEOUT_SECONDS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    let targets_path =
        std::env::var("TARGETS_CONFIG").unwrap_or_else(|_| "targets.yaml".into());

    tracing::info!(
        listen_addr = %listen_addr,
        auth_base_url = %auth_base_url,
        auth_timeout_seconds,
        targets_config = %targets_path,
        "Gateway configuration loaded"
    );

    let targets = ProxyConfig::load(&targets_path)?;
    tracing::info!(count = targets.targets.len(), "Target list loaded");

    let gatekeeper = Arc::new(HttpGatekeeper::new(AuthConfig {
        base_url: auth_base_url,
        timeout_seconds: auth_timeout_seconds,
    })?);

    let gateway_config = GatewayConfig {
        listen_addr: listen_addr.clone(),
        ..GatewayConfig::default()
    };
    let backends = BackendFactory::new(&gateway_config)?;

    // Any invalid target aborts startup
    let registry = TargetRegistry::new(targets.targets, gatekeeper, backends)?;
    tracing::info!(targets = ?registry.target_ids(), "Target registry initialized");

    let state = GatewayState::new(Arc::new(registry), gateway_config);
    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
