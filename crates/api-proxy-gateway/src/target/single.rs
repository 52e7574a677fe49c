//! A target with one fixed backend.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use api_proxy_auth::Gatekeeper;
use api_proxy_core::TargetConfig;

use crate::backend::{parse_backend_url, Backend, BackendFactory};
use crate::dispatch::authorize_and_forward;
use crate::error::{ApiError, ProxyError, Result};

/// A target that forwards everything to one backend.
pub struct SingleTarget {
    config: TargetConfig,
    backend: Arc<dyn Backend>,
}

impl SingleTarget {
    /// Build the target, parsing its URL and selecting its backend.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` if the URL is missing or not absolute.
    pub fn new(config: TargetConfig, backends: &BackendFactory) -> Result<Self> {
        let raw = config.url.as_deref().ok_or_else(|| ProxyError::InvalidUrl {
            url: String::new(),
            reason: format!("single target {} has no url", config.id),
        })?;
        let url = parse_backend_url(raw)?;
        let backend = backends.build(config.protocol, url);

        Ok(Self { config, backend })
    }

    /// The target configuration.
    #[must_use]
    pub const fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// The backend requests are forwarded to.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub(crate) async fn handle(
        &self,
        gatekeeper: &dyn Gatekeeper,
        sub_path: &str,
        request: Request<Body>,
    ) -> std::result::Result<Response, ApiError> {
        authorize_and_forward(
            &self.config,
            gatekeeper,
            sub_path,
            self.backend.as_ref(),
            request,
        )
        .await
    }
}

impl std::fmt::Debug for SingleTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleTarget")
            .field("id", &self.config.id)
            .field("url", &self.backend.url().as_str())
            .finish_non_exhaustive()
    }
}
