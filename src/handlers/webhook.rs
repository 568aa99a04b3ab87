//! Webhook → work item pipeline.
//!
//! Steps run in order and stop at the first failure:
//! token, payload validation, configuration check, patch build, create call.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use tracing::{error, info, instrument};

use crate::app_state::AppState;
use crate::auth::DEVOPS_SCOPE;
use crate::error::{ApiError, Result};
use crate::middleware::metrics::{track_webhook_failure, track_work_item_created};
use crate::models::WorkItemCreatedResponse;
use crate::services::{build_patch, validate};

/// POST /api/webhook-to-devops
pub async fn webhook_to_devops(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<WorkItemCreatedResponse>)> {
    info!(bytes = body.len(), "Webhook received");

    match process_webhook(&state, &body).await {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(e) => {
            track_webhook_failure(e.reason());
            Err(e)
        }
    }
}

#[instrument(skip_all)]
pub async fn process_webhook(state: &AppState, body: &[u8]) -> Result<WorkItemCreatedResponse> {
    let token = state
        .credential
        .get_token(DEVOPS_SCOPE)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to acquire Azure DevOps access token");
            ApiError::AuthFailure(e)
        })?;

    let valid = validate(body, &state.config.devops.default_work_item_type)?;

    let target = state.config.devops.target().ok_or_else(|| {
        error!("DEVOPS_ORG_URL or DEVOPS_PROJECT_NAME is not configured");
        ApiError::ConfigMissing("DEVOPS_ORG_URL or DEVOPS_PROJECT_NAME is not set".to_string())
    })?;

    let patch = build_patch(&valid.title, &valid.payload);

    let created = state
        .devops_client
        .create_work_item(
            target.org_url,
            target.project,
            &valid.work_item_type,
            &token,
            &patch,
        )
        .await?;

    track_work_item_created(&valid.work_item_type);
    Ok(created.into())
}
