//! Delegated token checks.
//!
//! The gatekeeper never inspects tokens itself. It forwards them to the
//! authentication service's `/token/check` endpoint and compares the
//! permission level in the returned claims with the level a path requires.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::AuthConfig;

/// Content type of token check requests.
pub const CHECK_CONTENT_TYPE: &str = "application/x.token.check+json";

/// Trait for checking access privileges of a token.
#[async_trait]
pub trait Gatekeeper: Send + Sync {
    /// Check that `token` grants at least `required` privileges.
    ///
    /// Returns the effective token, which differs from `token` when the
    /// authentication service rotated it. An empty token is accepted for
    /// public paths (`required == 0`) without contacting the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is missing, rejected, carries too low
    /// privileges, or the authentication service cannot be reached.
    async fn check_access(&self, token: &str, required: u32, rotate: bool) -> Result<String>;
}

/// Body of a token check request.
#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    token: &'a str,
    update: bool,
}

/// Body of a successful token check response.
#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    claims: Claims,
}

/// Claims attached to a checked token.
#[derive(Debug, Default, Deserialize)]
struct Claims {
    #[serde(default)]
    permissions: i64,
}

/// Gatekeeper backed by the authentication service HTTP API.
#[derive(Debug, Clone)]
pub struct HttpGatekeeper {
    config: AuthConfig,
    client: reqwest::Client,
}

impl HttpGatekeeper {
    /// Create a new gatekeeper with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: AuthConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AuthError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Create a gatekeeper with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: AuthConfig) -> Self {
        Self { config, client }
    }

    /// Get the authentication service configuration.
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }
}

#[async_trait]
impl Gatekeeper for HttpGatekeeper {
    async fn check_access(&self, token: &str, required: u32, rotate: bool) -> Result<String> {
        if token.is_empty() {
            if required > 0 {
                return Err(AuthError::MissingToken);
            }
            return Ok(String::new());
        }

        let url = self.config.check_url();
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, CHECK_CONTENT_TYPE)
            .json(&CheckRequest {
                token,
                update: rotate,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "Token check request failed");
                AuthError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::error!(status = %status, "Got invalid status code from auth service");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: CheckResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                AuthError::InvalidResponse(e.to_string())
            } else {
                AuthError::Unavailable(e.to_string())
            }
        })?;

        let effective = body.token.unwrap_or_else(|| token.to_string());
        let granted = body.claims.permissions;
        if granted < i64::from(required) {
            tracing::debug!(granted, required, "Token privileges too low");
            return Err(AuthError::InsufficientPrivileges {
                token: effective,
                granted,
                required,
            });
        }

        Ok(effective)
    }
}

/// A recorded call to [`MockGatekeeper::check_access`].
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCheck {
    /// Token passed by the caller.
    pub token: String,
    /// Required privilege level.
    pub required: u32,
    /// Whether rotation was requested.
    pub rotate: bool,
}

/// A mock gatekeeper for testing.
///
/// Tokens registered with [`MockGatekeeper::with_token`] are accepted with the
/// given permission level; any other non-empty token is rejected with `401`.
/// When rotation is requested and a rotated token is configured, that token is
/// returned instead of the presented one.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockGatekeeper {
    tokens: std::collections::HashMap<String, i64>,
    rotated: Option<String>,
    unavailable: bool,
    calls: parking_lot::Mutex<Vec<AccessCheck>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockGatekeeper {
    /// Create a mock that knows no tokens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` with the given permission level.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, permissions: i64) -> Self {
        self.tokens.insert(token.into(), permissions);
        self
    }

    /// Return `token` whenever rotation is requested.
    #[must_use]
    pub fn rotating_to(mut self, token: impl Into<String>) -> Self {
        self.rotated = Some(token.into());
        self
    }

    /// Fail every check that would reach the service as unavailable.
    #[must_use]
    pub const fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// All recorded calls, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<AccessCheck> {
        self.calls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Gatekeeper for MockGatekeeper {
    async fn check_access(&self, token: &str, required: u32, rotate: bool) -> Result<String> {
        self.calls.lock().push(AccessCheck {
            token: token.to_string(),
            required,
            rotate,
        });

        if token.is_empty() {
            if required > 0 {
                return Err(AuthError::MissingToken);
            }
            return Ok(String::new());
        }
        if self.unavailable {
            return Err(AuthError::Unavailable("mock service down".to_string()));
        }

        let granted = *self
            .tokens
            .get(token)
            .ok_or(AuthError::Rejected { status: 401 })?;
        let effective = match (&self.rotated, rotate) {
            (Some(rotated), true) => rotated.clone(),
            _ => token.to_string(),
        };
        if granted < i64::from(required) {
            return Err(AuthError::InsufficientPrivileges {
                token: effective,
                granted,
                required,
            });
        }
        Ok(effective)
    }
}
