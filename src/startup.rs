//! Application startup and initialization logic.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::auth::{
    AzureCliCredential, ChainedTokenCredential, EnvironmentCredential, ManagedIdentityCredential,
    TokenCredential,
};
use crate::config::Config;
use crate::services::DevOpsClient;

/// Initialize services and create the AppState.
pub fn initialize_app(config: Config) -> Result<AppState> {
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    info!("Prometheus metrics initialized");

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

    let credential = build_credential_chain(&config, http_client.clone());
    info!(sources = credential.len(), "Credential chain initialized");

    match config.devops.target() {
        Some(target) => info!(
            org_url = %target.org_url,
            project = %target.project,
            default_work_item_type = %config.devops.default_work_item_type,
            "Azure DevOps target configured"
        ),
        None => warn!(
            "DEVOPS_ORG_URL or DEVOPS_PROJECT_NAME is not set; webhooks will be rejected until configured"
        ),
    }

    if config.function_key.is_none() {
        warn!("FUNCTION_KEY is not set; the webhook endpoint accepts unauthenticated requests");
    }

    Ok(AppState::new(
        config,
        Arc::new(credential),
        DevOpsClient::new(http_client),
        metrics_handle,
    ))
}

/// Environment secret, then managed identity, then the Azure CLI.
pub fn build_credential_chain(config: &Config, client: reqwest::Client) -> ChainedTokenCredential {
    let sources: Vec<Arc<dyn TokenCredential>> = vec![
        Arc::new(EnvironmentCredential::new(client.clone(), &config.azure)),
        Arc::new(ManagedIdentityCredential::new(client, &config.azure)),
        Arc::new(AzureCliCredential::new(config.azure.tenant_id.clone())),
    ];
    ChainedTokenCredential::new(sources)
}

/// Wait for shutdown signal.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully");
        },
    }
}
