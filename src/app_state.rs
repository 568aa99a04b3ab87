//! Application state shared across all handlers.
//!
//! Everything in here is read-only after startup; cloning is cheap.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::auth::TokenCredential;
use crate::config::Config;
use crate::services::DevOpsClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, loaded once at startup
    pub config: Arc<Config>,
    /// Credential chain used to obtain Azure DevOps tokens
    pub credential: Arc<dyn TokenCredential>,
    /// Work item API client
    pub devops_client: DevOpsClient,
    /// Prometheus render handle for `/metrics`
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(
        config: Config,
        credential: Arc<dyn TokenCredential>,
        devops_client: DevOpsClient,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            credential,
            devops_client,
            metrics_handle,
        }
    }
}
