//! Proxy target configuration.
//!
//! A [`TargetConfig`] describes one routable destination. It is handed to the
//! gateway at startup (parsed from YAML) or built by the control plane when a
//! pool is created, and is never mutated afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::policy::Privileges;

/// The kind of a proxy target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A single fixed backend.
    Single,
    /// A mutable pool of backends addressed by member identifier.
    Pool,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Pool => f.write_str("pool"),
        }
    }
}

/// The protocol spoken by a target's backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Plain HTTP, forwarded through a reverse proxy.
    #[default]
    #[serde(rename = "HTTP")]
    Http,
    /// WebSocket, forwarded through an upgrading proxy.
    #[serde(rename = "WS")]
    WebSocket,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("HTTP"),
            Self::WebSocket => f.write_str("WS"),
        }
    }
}

/// Configuration of a single proxy target.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Unique target identifier, used as the first routing segment.
    pub id: String,

    /// Whether this is a single backend or a pool.
    #[serde(rename = "type")]
    pub kind: TargetKind,

    /// Protocol of the backend(s).
    #[serde(default)]
    pub protocol: Protocol,

    /// Backend URL. Required for single targets, ignored for pools.
    #[serde(default)]
    pub url: Option<String>,

    /// Whether the gatekeeper should rotate the token on each check.
    #[serde(default, rename = "updatesToken")]
    pub updates_token: bool,

    /// Access privileges for this target's paths.
    #[serde(default)]
    pub privileges: Privileges,
}

impl TargetConfig {
    /// Create a single-backend target configuration with public access.
    #[must_use]
    pub fn single(id: impl Into<String>, protocol: Protocol, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TargetKind::Single,
            protocol,
            url: Some(url.into()),
            updates_token: false,
            privileges: Privileges::default(),
        }
    }

    /// Create a pool target configuration with public access.
    #[must_use]
    pub fn pool(id: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            id: id.into(),
            kind: TargetKind::Pool,
            protocol,
            url: None,
            updates_token: false,
            privileges: Privileges::default(),
        }
    }

    /// Set the privileges policy.
    #[must_use]
    pub fn with_privileges(mut self, privileges: Privileges) -> Self {
        self.privileges = privileges;
        self
    }

    /// Set whether the gatekeeper rotates the token.
    #[must_use]
    pub const fn with_token_rotation(mut self, updates_token: bool) -> Self {
        self.updates_token = updates_token;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_target() {
        let yaml = r#"
id: catalog
type: single
protocol: HTTP
url: http://catalog:8080
updatesToken: true
privileges:
  default: 1
  paths:
    - exact: /catalog/templates
      method: GET
      privileges: 5
    - regex: '\/catalog\/templates\/[^\/\s]*$'
      method: POST
      privileges: 10
"#;
        let config: TargetConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.id, "catalog");
        assert_eq!(config.kind, TargetKind::Single);
        assert_eq!(config.protocol, Protocol::Http);
        assert_eq!(config.url.as_deref(), Some("http://catalog:8080"));
        assert!(config.updates_token);
        assert_eq!(config.privileges.default, 1);
        assert_eq!(config.privileges.paths.len(), 2);
    }

    #[test]
    fn defaults_apply_to_minimal_pool() {
        let config: TargetConfig = serde_yaml::from_str("id: sockets\ntype: pool\n").unwrap();
        assert_eq!(config.kind, TargetKind::Pool);
        assert_eq!(config.protocol, Protocol::Http);
        assert!(config.url.is_none());
        assert!(!config.updates_token);
        assert_eq!(config.privileges.default, 0);
        assert!(config.privileges.paths.is_empty());
    }

    #[test]
    fn websocket_protocol_name() {
        let config: TargetConfig =
            serde_json::from_str(r#"{"id":"w","type":"pool","protocol":"WS"}"#).unwrap();
        assert_eq!(config.protocol, Protocol::WebSocket);
        assert_eq!(config.protocol.to_string(), "WS");
    }

    #[test]
    fn rejects_unknown_kind() {
        let result: Result<TargetConfig, _> = serde_yaml::from_str("id: x\ntype: cluster\n");
        assert!(result.is_err());
    }

    #[test]
    fn builders() {
        let config = TargetConfig::single("t1", Protocol::Http, "http://t1.com")
            .with_token_rotation(true);
        assert_eq!(config.kind, TargetKind::Single);
        assert!(config.updates_token);

        let pool = TargetConfig::pool("p", Protocol::WebSocket);
        assert_eq!(pool.kind.to_string(), "pool");
        assert!(pool.url.is_none());
    }
}
