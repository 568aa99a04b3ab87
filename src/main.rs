use std::net::SocketAddr;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use webhook_to_devops::{router, startup, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("webhook_to_devops={},tower_http=info", config.log_level).into()
    });
    if config.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!(environment = %config.environment, config = ?config, "Loaded configuration");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app_state = startup::initialize_app(config)?;
    let app = router::build_router(app_state);

    info!("Starting webhook-to-devops server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(startup::shutdown_signal())
        .await?;

    Ok(())
}
