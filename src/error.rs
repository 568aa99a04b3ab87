use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::CredentialError;
use crate::middleware::request_logger::current_request_id;
use crate::services::devops_client::DevOpsError;
use crate::services::webhook_validator::ValidationError;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    #[serde(rename = "AUTH_1001")]
    DevOpsAuthenticationFailed,
    #[serde(rename = "AUTH_1002")]
    FunctionKeyInvalid,

    // Validation errors (3xxx)
    #[serde(rename = "VAL_3001")]
    InvalidJson,
    #[serde(rename = "VAL_3002")]
    MissingControlObject,
    #[serde(rename = "VAL_3003")]
    MissingTitle,

    // External service errors (8xxx)
    #[serde(rename = "EXT_8001")]
    DevOpsApiError,
    #[serde(rename = "EXT_8002")]
    DevOpsMalformedResponse,

    // Internal errors (9xxx)
    #[serde(rename = "INT_9998")]
    ConfigurationError,
    #[serde(rename = "INT_9997")]
    UnexpectedError,
}

impl ErrorCode {
    /// Get numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::DevOpsAuthenticationFailed => 1001,
            ErrorCode::FunctionKeyInvalid => 1002,

            ErrorCode::InvalidJson => 3001,
            ErrorCode::MissingControlObject => 3002,
            ErrorCode::MissingTitle => 3003,

            ErrorCode::DevOpsApiError => 8001,
            ErrorCode::DevOpsMalformedResponse => 8002,

            ErrorCode::ConfigurationError => 9998,
            ErrorCode::UnexpectedError => 9997,
        }
    }
}

/// Structured error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub request_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub code_number: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

pub const AUTH_FAILURE_MESSAGE: &str = "Failed to authenticate with Azure DevOps. Check service logs for details. \
Ensure the managed identity or local credentials are configured and have access to the organization.";
pub const CONFIG_MISSING_MESSAGE: &str =
    "Azure DevOps organization URL or project name is not configured in service settings.";
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred while creating the work item.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authentication with Azure DevOps failed: {0}")]
    AuthFailure(#[from] CredentialError),

    #[error("Invalid webhook payload: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    ConfigMissing(String),

    #[error("Azure DevOps API error ({status}): {body}")]
    Downstream { status: u16, body: String },

    #[error("Malformed Azure DevOps response: {0}")]
    MalformedApiResponse(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<DevOpsError> for ApiError {
    fn from(err: DevOpsError) -> Self {
        match err {
            DevOpsError::ConfigMissing => ApiError::ConfigMissing(err.to_string()),
            DevOpsError::InvalidOrgUrl(_) => ApiError::ConfigMissing(err.to_string()),
            DevOpsError::Api { status, body } => ApiError::Downstream { status, body },
            DevOpsError::MalformedResponse(reason) => ApiError::MalformedApiResponse(reason),
            DevOpsError::Encode(_) => ApiError::Unexpected(err.to_string()),
            DevOpsError::Transport(e) => ApiError::Unexpected(e.to_string()),
        }
    }
}

impl ApiError {
    /// Get error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::Unauthorized(_) => ErrorCode::FunctionKeyInvalid,
            ApiError::AuthFailure(_) => ErrorCode::DevOpsAuthenticationFailed,
            ApiError::Validation(ValidationError::MalformedJson) => ErrorCode::InvalidJson,
            ApiError::Validation(ValidationError::MissingControlObject) => {
                ErrorCode::MissingControlObject
            }
            ApiError::Validation(ValidationError::MissingTitle) => ErrorCode::MissingTitle,
            ApiError::ConfigMissing(_) => ErrorCode::ConfigurationError,
            ApiError::Downstream { .. } => ErrorCode::DevOpsApiError,
            ApiError::MalformedApiResponse(_) => ErrorCode::DevOpsMalformedResponse,
            ApiError::Unexpected(_) => ErrorCode::UnexpectedError,
        }
    }

    /// Get status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            // Pass the downstream status straight through to the webhook sender
            ApiError::Downstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::AuthFailure(_)
            | ApiError::ConfigMissing(_)
            | ApiError::MalformedApiResponse(_)
            | ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller. Internal causes stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Unauthorized(msg) => msg.clone(),
            ApiError::AuthFailure(_) => AUTH_FAILURE_MESSAGE.to_string(),
            ApiError::Validation(e) => e.to_string(),
            ApiError::ConfigMissing(_) => CONFIG_MISSING_MESSAGE.to_string(),
            ApiError::Downstream { body, .. } => {
                format!("Failed to create work item. Azure DevOps API Error: {}", body)
            }
            ApiError::MalformedApiResponse(_) | ApiError::Unexpected(_) => {
                UNEXPECTED_MESSAGE.to_string()
            }
        }
    }

    fn error_details(&self) -> Option<String> {
        match self {
            ApiError::Downstream { body, .. } => Some(body.clone()),
            _ => None,
        }
    }

    fn error_field(&self) -> Option<String> {
        match self {
            ApiError::Validation(e) => e.field().map(str::to_string),
            _ => None,
        }
    }

    /// Metric label for the failure
    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::AuthFailure(_) => "auth_failure",
            ApiError::Validation(ValidationError::MalformedJson) => "malformed_json",
            ApiError::Validation(ValidationError::MissingControlObject) => "missing_control",
            ApiError::Validation(ValidationError::MissingTitle) => "missing_title",
            ApiError::ConfigMissing(_) => "config_missing",
            ApiError::Downstream { .. } => "api_error",
            ApiError::MalformedApiResponse(_) => "malformed_api_response",
            ApiError::Unexpected(_) => "unexpected",
        }
    }

    /// Log error with appropriate level
    fn log_error(&self, request_id: &str) {
        match self.status_code() {
            status if status.is_server_error() => {
                error!(
                    request_id = %request_id,
                    error = %self,
                    "Server error occurred"
                );
            }
            status if status.is_client_error() => {
                warn!(
                    request_id = %request_id,
                    error = %self,
                    "Client error occurred"
                );
            }
            _ => {}
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = current_request_id().unwrap_or_else(|| Uuid::new_v4().to_string());
        let status = self.status_code();
        let code = self.error_code();

        self.log_error(&request_id);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code,
                code_number: code.code(),
                message: self.public_message(),
                details: self.error_details(),
                field: self.error_field(),
            },
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}
