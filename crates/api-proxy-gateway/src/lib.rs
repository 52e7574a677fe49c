//! Authenticating HTTP and WebSocket reverse-proxy gateway.
//!
//! Inbound requests are resolved to a named target, authorized against the
//! target's privilege policy and forwarded to the target's backend:
//!
//! - `/api/{id}/...` forwards plain HTTP with any method
//! - `/ws/{id}/...` upgrades to a WebSocket and relays frames
//! - `/pool/...` creates pools and manages their members at runtime
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                              │
//! │                   (HTTP / WebSocket)                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    api-proxy-gateway                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Router    │ │  Target     │ │  Dispatch           │    │
//! │  │ + Handlers  │ │  Registry   │ │  (policy + auth)    │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!        ┌──────────────┐             ┌──────────────┐
//!        │ Auth service │             │  Backends    │
//!        │ /token/check │             │ (HTTP / WS)  │
//!        └──────────────┘             └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use api_proxy_auth::{AuthConfig, HttpGatekeeper};
//! use api_proxy_gateway::{
//!     create_router, BackendFactory, GatewayConfig, GatewayState, ProxyConfig, TargetRegistry,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default();
//! let targets = ProxyConfig::load("targets.yaml")?;
//!
//! let gatekeeper = Arc::new(HttpGatekeeper::new(AuthConfig::new("http://auth"))?);
//! let backends = BackendFactory::new(&config)?;
//! let registry = TargetRegistry::new(targets.targets, gatekeeper, backends)?;
//!
//! let app = create_router(GatewayState::new(Arc::new(registry), config));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod routes;
pub mod state;
pub mod target;

pub use backend::{Backend, BackendFactory, HttpBackend, WsBackend};
pub use config::{ConfigError, GatewayConfig, ProxyConfig};
pub use error::{ApiError, ProxyError};
pub use registry::TargetRegistry;
pub use routes::create_router;
pub use state::GatewayState;
pub use target::{PoolTarget, SingleTarget, Target};
