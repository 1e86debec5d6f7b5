//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::gateway::ObjectStoreGateway;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    gateway: Arc<dyn ObjectStoreGateway>,
}

impl AppState {
    /// Create a new application state
    ///
    /// The gateway is injected as a trait object so route tests can swap in
    /// an in-memory store.
    pub fn new(config: Config, gateway: Arc<dyn ObjectStoreGateway>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, gateway }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the object-store gateway
    pub fn gateway(&self) -> &Arc<dyn ObjectStoreGateway> {
        &self.inner.gateway
    }
}
