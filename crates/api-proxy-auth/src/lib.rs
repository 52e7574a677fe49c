//! Gatekeeper client for api-proxy.
//!
//! Token validation is delegated to an external authentication service. This
//! crate only speaks its client protocol:
//!
//! - `POST {base_url}/token/check` with `{"token": ..., "update": bool}`
//! - a `200` answer carries the (possibly rotated) `token` and
//!   `claims.permissions`; any other status means unauthorized
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Gateway        │────▶│   Gatekeeper     │
//! │   (dispatch)     │     │   (trait)        │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │  HttpGatekeeper  │
//!                          │  (impl)          │
//!                          └────────┬─────────┘
//!                                   │ HTTP
//!                          ┌────────▼─────────┐
//!                          │   Auth service   │
//!                          │   /token/check   │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use api_proxy_auth::{AuthConfig, Gatekeeper, HttpGatekeeper};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let keeper = HttpGatekeeper::new(AuthConfig::new("http://auth"))?;
//!
//! // Require privilege level 5 and ask the service to rotate the token.
//! let token = keeper.check_access("eyJhbGciOi...", 5, true).await?;
//! println!("Effective token: {token}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::time::Duration;

pub mod error;
pub mod gatekeeper;

pub use error::{AuthError, Result};
pub use gatekeeper::{Gatekeeper, HttpGatekeeper, CHECK_CONTENT_TYPE};

#[cfg(any(test, feature = "test-utils"))]
pub use gatekeeper::{AccessCheck, MockGatekeeper};

/// Configuration for the authentication service client.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the authentication service (e.g., `http://auth`).
    pub base_url: String,
    /// Timeout for a single token check, in seconds.
    pub timeout_seconds: u64,
}

impl AuthConfig {
    /// Create a configuration for the given base URL with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Get the token check endpoint URL.
    #[must_use]
    pub fn check_url(&self) -> String {
        format!("{}/token/check", self.base_url.trim_end_matches('/'))
    }

    /// Get the token check timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://auth".to_string(),
            timeout_seconds: 10,
        }
    }
}
