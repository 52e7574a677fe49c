//! A target with a mutable set of members.
//!
//! Requests to a pool name the member in their first path segment:
//! `/ws/{pool}/{member}/rest`. The pool's policy is evaluated against the
//! path that follows the member segment.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use parking_lot::RwLock;
use reqwest::Url;

use api_proxy_auth::Gatekeeper;
use api_proxy_core::TargetConfig;

use crate::backend::{Backend, BackendFactory};
use crate::dispatch::authorize_and_forward;
use crate::error::{ApiError, ProxyError, Result};

/// A target routing to one of several backends by member identifier.
pub struct PoolTarget {
    config: TargetConfig,
    members: RwLock<HashMap<String, Arc<dyn Backend>>>,
    backends: BackendFactory,
}

impl PoolTarget {
    /// Create an empty pool.
    #[must_use]
    pub fn new(config: TargetConfig, backends: BackendFactory) -> Self {
        Self {
            config,
            members: RwLock::new(HashMap::new()),
            backends,
        }
    }

    /// The pool configuration.
    #[must_use]
    pub const fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Add a member, replacing any member with the same identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMemberId` if the identifier is empty or contains `/`.
    pub fn add(&self, member_id: &str, url: Url) -> Result<()> {
        if member_id.is_empty() || member_id.contains('/') {
            return Err(ProxyError::InvalidMemberId(member_id.to_string()));
        }

        let backend = self.backends.build(self.config.protocol, url);
        let replaced = self
            .members
            .write()
            .insert(member_id.to_string(), backend)
            .is_some();

        tracing::info!(
            pool_id = %self.config.id,
            member_id = %member_id,
            replaced,
            "Pool member added"
        );
        Ok(())
    }

    /// Remove a member. Removing an unknown member is a no-op.
    ///
    /// Returns whether a member was removed.
    pub fn remove(&self, member_id: &str) -> bool {
        let removed = self.members.write().remove(member_id).is_some();
        if removed {
            tracing::info!(pool_id = %self.config.id, member_id = %member_id, "Pool member removed");
        }
        removed
    }

    /// Look up a member's backend.
    #[must_use]
    pub fn member(&self, member_id: &str) -> Option<Arc<dyn Backend>> {
        self.members.read().get(member_id).cloned()
    }

    /// Identifiers of all members, sorted.
    #[must_use]
    pub fn member_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.members.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// Whether the pool has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    pub(crate) async fn handle(
        &self,
        gatekeeper: &dyn Gatekeeper,
        sub_path: &str,
        request: Request<Body>,
    ) -> std::result::Result<Response, ApiError> {
        let (member_id, rest) = split_member(sub_path);
        if member_id.is_empty() {
            return Err(ProxyError::MissingMember(self.config.id.clone()).into());
        }

        let backend = self
            .member(member_id)
            .ok_or_else(|| ProxyError::MemberNotFound {
                pool_id: self.config.id.clone(),
                member_id: member_id.to_string(),
            })?;

        authorize_and_forward(&self.config, gatekeeper, rest, backend.as_ref(), request).await
    }
}

impl std::fmt::Debug for PoolTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolTarget")
            .field("id", &self.config.id)
            .field("members", &self.member_ids())
            .finish_non_exhaustive()
    }
}

/// Split `/member/rest` into `("member", "/rest")`.
///
/// The remainder is `/` when nothing follows the member segment.
pub(crate) fn split_member(sub_path: &str) -> (&str, &str) {
    let trimmed = sub_path.trim_start_matches('/');
    match trimmed.find('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, "/"),
    }
}
