use reqwest::{header, Client, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::auth::AccessToken;
use crate::models::{PatchDocument, WorkItemResult};

pub const DEVOPS_API_VERSION: &str = "7.2-preview";
pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

#[derive(Debug, Error)]
pub enum DevOpsError {
    #[error("Azure DevOps organization URL or project name is not configured")]
    ConfigMissing,

    #[error("Invalid Azure DevOps organization URL '{0}'")]
    InvalidOrgUrl(String),

    #[error("Azure DevOps API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to encode patch document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Malformed Azure DevOps response: {0}")]
    MalformedResponse(String),

    #[error("Request to Azure DevOps failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Thin client for the work item tracking REST API.
#[derive(Clone)]
pub struct DevOpsClient {
    client: Client,
}

impl DevOpsClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// `{org_url}/{project}/_apis/wit/workitems/${type}?api-version=...`
    pub fn work_item_url(org_url: &str, project: &str, work_item_type: &str) -> Result<Url, DevOpsError> {
        let mut url = Url::parse(org_url.trim_end_matches('/'))
            .map_err(|_| DevOpsError::InvalidOrgUrl(org_url.to_string()))?;

        url.path_segments_mut()
            .map_err(|_| DevOpsError::InvalidOrgUrl(org_url.to_string()))?
            .pop_if_empty()
            .push(project)
            .extend(["_apis", "wit", "workitems"])
            .push(&format!("${}", work_item_type));
        url.query_pairs_mut().append_pair("api-version", DEVOPS_API_VERSION);

        Ok(url)
    }

    /// Create a work item of `work_item_type` from `patch`.
    pub async fn create_work_item(
        &self,
        org_url: &str,
        project: &str,
        work_item_type: &str,
        token: &AccessToken,
        patch: &PatchDocument,
    ) -> Result<WorkItemResult, DevOpsError> {
        if org_url.trim().is_empty() || project.trim().is_empty() {
            error!("DEVOPS_ORG_URL or DEVOPS_PROJECT_NAME is not configured");
            return Err(DevOpsError::ConfigMissing);
        }

        let url = Self::work_item_url(org_url, project, work_item_type)?;
        let body = serde_json::to_vec(patch).map_err(DevOpsError::Encode)?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token.secret())
            .header(header::CONTENT_TYPE, JSON_PATCH_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!(status = %status, response = %text, "Azure DevOps API returned an error");
            return Err(DevOpsError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let result = parse_work_item(&text)?;
        info!(
            work_item_id = result.id,
            project = %project,
            work_item_type = %work_item_type,
            "Successfully created work item"
        );
        Ok(result)
    }
}

/// Pull `id` and `_links.html.href` out of the create response.
fn parse_work_item(body: &str) -> Result<WorkItemResult, DevOpsError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| DevOpsError::MalformedResponse(format!("response is not JSON: {}", e)))?;

    let id = value
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| DevOpsError::MalformedResponse("missing 'id'".to_string()))?;

    let url = value
        .pointer("/_links/html/href")
        .and_then(Value::as_str)
        .ok_or_else(|| DevOpsError::MalformedResponse("missing '_links.html.href'".to_string()))?;

    Ok(WorkItemResult {
        id,
        url: url.to_string(),
    })
}
