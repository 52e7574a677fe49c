//! Routable targets.
//!
//! A [`Target`] is either a [`SingleTarget`] with one fixed backend or a
//! [`PoolTarget`] whose members are added and removed at runtime. Both share
//! the same authorization gate.

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use api_proxy_auth::Gatekeeper;
use api_proxy_core::{Protocol, TargetConfig, TargetKind};

use crate::backend::BackendFactory;
use crate::error::{ApiError, Result};

mod pool;
mod single;

pub use pool::PoolTarget;
pub use single::SingleTarget;

/// A routable destination.
#[derive(Debug)]
pub enum Target {
    /// One fixed backend.
    Single(SingleTarget),
    /// A mutable set of backends addressed by member identifier.
    Pool(PoolTarget),
}

impl Target {
    /// Build a target from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if a single target's URL is missing or invalid.
    pub fn from_config(config: TargetConfig, backends: &BackendFactory) -> Result<Self> {
        match config.kind {
            TargetKind::Single => Ok(Self::Single(SingleTarget::new(config, backends)?)),
            TargetKind::Pool => {
                if config.url.is_some() {
                    tracing::debug!(target_id = %config.id, "Ignoring url configured on pool");
                }
                Ok(Self::Pool(PoolTarget::new(config, backends.clone())))
            }
        }
    }

    /// The target configuration.
    #[must_use]
    pub const fn config(&self) -> &TargetConfig {
        match self {
            Self::Single(t) => t.config(),
            Self::Pool(p) => p.config(),
        }
    }

    /// The target identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.config().id
    }

    /// The target kind.
    #[must_use]
    pub const fn kind(&self) -> TargetKind {
        match self {
            Self::Single(_) => TargetKind::Single,
            Self::Pool(_) => TargetKind::Pool,
        }
    }

    /// The protocol of the target's backends.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.config().protocol
    }

    /// Whether the gatekeeper rotates tokens for this target.
    #[must_use]
    pub const fn updates_token(&self) -> bool {
        self.config().updates_token
    }

    /// Privilege level required for `path` and `method`.
    #[must_use]
    pub fn privileges_for_path(&self, path: &str, method: &str) -> u32 {
        self.config().privileges.resolve(path, method)
    }

    /// The pool, if this target is one.
    #[must_use]
    pub const fn as_pool(&self) -> Option<&PoolTarget> {
        match self {
            Self::Pool(p) => Some(p),
            Self::Single(_) => None,
        }
    }

    /// Authorize and forward a request addressed to `sub_path` of this target.
    ///
    /// # Errors
    ///
    /// Returns the error response to send back to the client.
    pub async fn handle(
        &self,
        gatekeeper: &dyn Gatekeeper,
        sub_path: &str,
        request: Request<Body>,
    ) -> std::result::Result<Response, ApiError> {
        match self {
            Self::Single(t) => t.handle(gatekeeper, sub_path, request).await,
            Self::Pool(p) => p.handle(gatekeeper, sub_path, request).await,
        }
    }
}
