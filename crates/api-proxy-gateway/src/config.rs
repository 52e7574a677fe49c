//! Gateway configuration types.
//!
//! [`GatewayConfig`] holds the listener and transport settings. [`ProxyConfig`]
//! is the YAML document listing the targets the registry is seeded with.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use api_proxy_core::TargetConfig;

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Timeout for opening a backend WebSocket, in seconds.
    #[serde(default = "GatewayConfig::default_ws_connect_timeout")]
    pub ws_connect_timeout_seconds: u64,

    /// Timeout for opening a backend HTTP connection, in seconds.
    #[serde(default = "GatewayConfig::default_backend_connect_timeout")]
    pub backend_connect_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    const fn default_max_body() -> usize {
        10 * 1024 * 1024 // 10 MB
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_ws_connect_timeout() -> u64 {
        10
    }

    const fn default_backend_connect_timeout() -> u64 {
        5
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the WebSocket connect timeout as a `Duration`.
    #[must_use]
    pub fn ws_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_connect_timeout_seconds)
    }

    /// Get the backend HTTP connect timeout as a `Duration`.
    #[must_use]
    pub fn backend_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_connect_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
            ws_connect_timeout_seconds: Self::default_ws_connect_timeout(),
            backend_connect_timeout_seconds: Self::default_backend_connect_timeout(),
        }
    }
}

/// Errors raised while loading the target list.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The configuration file path.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not a valid target list.
    #[error("invalid target configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// The target list the registry is seeded with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    /// Configured targets, in file order.
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl ProxyConfig {
    /// Parse a target list from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, including path rules
    /// with both or neither of `exact` and `regex`.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a target list from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }
}
