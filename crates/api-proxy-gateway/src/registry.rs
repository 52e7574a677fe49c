//! Target registry.
//!
//! The registry owns every target keyed by identifier. Lookups clone the
//! target's `Arc` out of the map so no lock is held while a request is
//! authorized or forwarded.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use parking_lot::RwLock;

use api_proxy_auth::Gatekeeper;
use api_proxy_core::{TargetConfig, TargetKind};

use crate::backend::{parse_backend_url, BackendFactory};
use crate::error::{ApiError, ProxyError, Result};
use crate::target::{PoolTarget, Target};

/// Owns all targets and dispatches requests to them.
pub struct TargetRegistry {
    targets: RwLock<HashMap<String, Arc<Target>>>,
    gatekeeper: Arc<dyn Gatekeeper>,
    backends: BackendFactory,
}

impl TargetRegistry {
    /// Build a registry seeded with the configured targets.
    ///
    /// # Errors
    ///
    /// Returns an error if a single target's URL is invalid or an identifier
    /// appears twice.
    pub fn new(
        configs: Vec<TargetConfig>,
        gatekeeper: Arc<dyn Gatekeeper>,
        backends: BackendFactory,
    ) -> Result<Self> {
        let mut targets = HashMap::with_capacity(configs.len());

        for config in configs {
            if targets.contains_key(&config.id) {
                return Err(ProxyError::Conflict(config.id));
            }

            let target = Target::from_config(config, &backends)?;
            tracing::info!(
                target_id = %target.id(),
                kind = %target.kind(),
                protocol = %target.protocol(),
                "Registered target"
            );
            targets.insert(target.id().to_string(), Arc::new(target));
        }

        Ok(Self {
            targets: RwLock::new(targets),
            gatekeeper,
            backends,
        })
    }

    /// Look up a target.
    #[must_use]
    pub fn get(&self, target_id: &str) -> Option<Arc<Target>> {
        self.targets.read().get(target_id).cloned()
    }

    /// Identifiers of all targets, sorted.
    #[must_use]
    pub fn target_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.targets.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    /// Whether no targets are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }

    /// Create an empty pool.
    ///
    /// # Errors
    ///
    /// Returns `InvalidType` if the configuration is not a pool and
    /// `Conflict` if the identifier is taken.
    pub fn create_pool(&self, config: TargetConfig) -> Result<Arc<Target>> {
        if config.kind != TargetKind::Pool {
            return Err(ProxyError::InvalidType {
                id: config.id,
                expected: TargetKind::Pool,
                actual: config.kind,
            });
        }

        let id = config.id.clone();
        let target = Arc::new(Target::Pool(PoolTarget::new(config, self.backends.clone())));

        match self.targets.write().entry(id.clone()) {
            Entry::Occupied(_) => return Err(ProxyError::Conflict(id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&target));
            }
        }

        tracing::info!(pool_id = %id, protocol = %target.protocol(), "Pool created");
        Ok(target)
    }

    /// Remove a pool and all its members.
    ///
    /// # Errors
    ///
    /// Returns `TargetNotFound` if absent and `InvalidType` if the identifier
    /// names a single target.
    pub fn remove_pool(&self, pool_id: &str) -> Result<()> {
        let mut targets = self.targets.write();
        let target = targets
            .get(pool_id)
            .ok_or_else(|| ProxyError::TargetNotFound(pool_id.to_string()))?;
        require_pool(pool_id, target)?;
        targets.remove(pool_id);
        drop(targets);

        tracing::info!(pool_id = %pool_id, "Pool removed");
        Ok(())
    }

    /// Add a member to a pool, replacing any member with the same identifier.
    ///
    /// # Errors
    ///
    /// Returns `TargetNotFound`, `InvalidType` for single targets and
    /// `InvalidUrl` if `uri` is not an absolute URL.
    pub fn add_to_pool(&self, pool_id: &str, member_id: &str, uri: &str) -> Result<()> {
        self.with_pool(pool_id, |pool| {
            let url = parse_backend_url(uri)?;
            pool.add(member_id, url)
        })
    }

    /// Remove a member from a pool. Unknown members are ignored.
    ///
    /// # Errors
    ///
    /// Returns `TargetNotFound` or `InvalidType` for single targets.
    pub fn remove_from_pool(&self, pool_id: &str, member_id: &str) -> Result<()> {
        self.with_pool(pool_id, |pool| {
            pool.remove(member_id);
            Ok(())
        })
    }

    /// List a pool's member identifiers.
    ///
    /// # Errors
    ///
    /// Returns `TargetNotFound` or `InvalidType` for single targets.
    pub fn pool_members(&self, pool_id: &str) -> Result<Vec<String>> {
        self.with_pool(pool_id, |pool| Ok(pool.member_ids()))
    }

    /// Route a request to `sub_path` of the target `target_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown targets and any error raised while
    /// authorizing or forwarding.
    pub async fn dispatch(
        &self,
        target_id: &str,
        sub_path: &str,
        request: Request<Body>,
    ) -> std::result::Result<Response, ApiError> {
        let target = self
            .get(target_id)
            .ok_or_else(|| ProxyError::TargetNotFound(target_id.to_string()))?;

        target
            .handle(self.gatekeeper.as_ref(), sub_path, request)
            .await
    }

    fn with_pool<T>(&self, pool_id: &str, f: impl FnOnce(&PoolTarget) -> Result<T>) -> Result<T> {
        let target = self
            .get(pool_id)
            .ok_or_else(|| ProxyError::TargetNotFound(pool_id.to_string()))?;
        f(require_pool(pool_id, &target)?)
    }
}

impl std::fmt::Debug for TargetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("targets", &self.target_ids())
            .finish_non_exhaustive()
    }
}

fn require_pool<'a>(id: &str, target: &'a Target) -> Result<&'a PoolTarget> {
    target.as_pool().ok_or_else(|| ProxyError::InvalidType {
        id: id.to_string(),
        expected: TargetKind::Pool,
        actual: target.kind(),
    })
}

#[cfg(test)]
mod tests {
    use api_proxy_auth::MockGatekeeper;
    use api_proxy_core::Protocol;
    use axum::http::StatusCode;

    use super::*;
    use crate::config::GatewayConfig;

    fn registry(configs: Vec<TargetConfig>) -> Result<TargetRegistry> {
        let backends = BackendFactory::new(&GatewayConfig::default()).unwrap();
        TargetRegistry::new(configs, Arc::new(MockGatekeeper::new()), backends)
    }

    fn seeded() -> TargetRegistry {
        registry(vec![
            TargetConfig::single("catalog", Protocol::Http, "http://catalog:8080"),
            TargetConfig::pool("sockets", Protocol::WebSocket),
        ])
        .unwrap()
    }

    #[test]
    fn seeds_configured_targets() {
        let registry = seeded();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.target_ids(), vec!["catalog", "sockets"]);
        assert_eq!(registry.get("catalog").unwrap().kind(), TargetKind::Single);
    }

    #[test]
    fn invalid_single_url_aborts_startup() {
        let result = registry(vec![TargetConfig::single("bad", Protocol::Http, "nope")]);
        assert!(matches!(result, Err(ProxyError::InvalidUrl { .. })));
    }

    #[test]
    fn duplicate_ids_abort_startup() {
        let result = registry(vec![
            TargetConfig::pool("dup", Protocol::Http),
            TargetConfig::single("dup", Protocol::Http, "http://x:1"),
        ]);
        assert!(matches!(result, Err(ProxyError::Conflict(id)) if id == "dup"));
    }

    #[test]
    fn create_pool_conflicts_with_existing_id() {
        let registry = seeded();
        let err = registry
            .create_pool(TargetConfig::pool("catalog", Protocol::Http))
            .unwrap_err();
        assert!(matches!(err, ProxyError::Conflict(_)));

        registry
            .create_pool(TargetConfig::pool("fresh", Protocol::Http))
            .unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn create_pool_requires_pool_config() {
        let registry = seeded();
        let err = registry
            .create_pool(TargetConfig::single("s", Protocol::Http, "http://s:1"))
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidType { .. }));
    }

    #[test]
    fn membership_operations_require_existing_pool() {
        let registry = seeded();

        let err = registry
            .add_to_pool("missing", "m", "http://m:1")
            .unwrap_err();
        assert!(matches!(err, ProxyError::TargetNotFound(_)));

        let err = registry.remove_from_pool("missing", "m").unwrap_err();
        assert!(matches!(err, ProxyError::TargetNotFound(_)));

        let err = registry
            .add_to_pool("catalog", "m", "http://m:1")
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidType { .. }));

        let err = registry.remove_from_pool("catalog", "m").unwrap_err();
        assert!(matches!(err, ProxyError::InvalidType { .. }));
    }

    #[test]
    fn add_to_pool_validates_url() {
        let registry = seeded();
        let err = registry
            .add_to_pool("sockets", "ws1", "not a url")
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn pool_members_are_independent() {
        let registry = seeded();
        registry.add_to_pool("sockets", "p1", "http://one:1").unwrap();
        registry.add_to_pool("sockets", "p2", "http://two:2").unwrap();
        registry.remove_from_pool("sockets", "p1").unwrap();
        registry.remove_from_pool("sockets", "p1").unwrap();

        assert_eq!(registry.pool_members("sockets").unwrap(), vec!["p2"]);
    }

    #[test]
    fn remove_pool() {
        let registry = seeded();
        registry.remove_pool("sockets").unwrap();
        assert!(registry.get("sockets").is_none());

        assert!(matches!(
            registry.remove_pool("sockets"),
            Err(ProxyError::TargetNotFound(_))
        ));
        assert!(matches!(
            registry.remove_pool("catalog"),
            Err(ProxyError::InvalidType { .. })
        ));
    }

    #[tokio::test]
    async fn dispatch_to_unknown_target_is_not_found() {
        let registry = seeded();
        let request = Request::get("/api/nope/x").body(Body::empty()).unwrap();

        let err = registry.dispatch("nope", "/x", request).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn concurrent_membership_changes() {
        let registry = Arc::new(seeded());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let id = format!("m{i}");
                    registry.add_to_pool("sockets", &id, "http://m:1").unwrap();
                    assert!(registry.pool_members("sockets").unwrap().contains(&id));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.pool_members("sockets").unwrap().len(), 8);
    }
}
