//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::registry::TargetRegistry;

/// Shared application state for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayState {
    /// The registry owning every target.
    pub registry: Arc<TargetRegistry>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Create a new gateway state.
    #[must_use]
    pub fn new(registry: Arc<TargetRegistry>, config: GatewayConfig) -> Self {
        Self { registry, config }
    }
}
