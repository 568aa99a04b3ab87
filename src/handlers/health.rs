use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub environment: String,
    /// Organization URL and project are both set
    pub devops_configured: bool,
    pub function_key_enabled: bool,
}

impl HealthStatus {
    pub fn from_state(state: &AppState) -> Self {
        let devops_configured = state.config.devops.target().is_some();
        Self {
            status: if devops_configured { "healthy" } else { "degraded" }.to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: state.config.environment.clone(),
            devops_configured,
            function_key_enabled: state.config.function_key.is_some(),
        }
    }
}

/// Basic health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus::from_state(&state))
}
