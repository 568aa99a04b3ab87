use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{scope_to_resource, AccessToken, CredentialError, NumberOrString, TokenCredential};
use crate::config::AzureConfig;

const NAME: &str = "ManagedIdentityCredential";

const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const IMDS_API_VERSION: &str = "2018-02-01";
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Where the managed identity token comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// App Service / Functions local identity endpoint
    AppService { endpoint: String, header: String },
    /// VM instance metadata service
    Imds { endpoint: String },
}

/// Token credential for the platform-assigned (or user-assigned) managed identity.
#[derive(Clone)]
pub struct ManagedIdentityCredential {
    client: Client,
    source: Option<IdentitySource>,
    /// Selects a user-assigned identity when set
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManagedIdentityToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<NumberOrString>,
    #[serde(default)]
    expires_in: Option<NumberOrString>,
}

impl ManagedIdentityCredential {
    pub fn new(client: Client, azure: &AzureConfig) -> Self {
        let source = match (&azure.identity_endpoint, &azure.identity_header) {
            (Some(endpoint), Some(header)) => Some(IdentitySource::AppService {
                endpoint: endpoint.clone(),
                header: header.clone(),
            }),
            _ if azure.imds_enabled => Some(IdentitySource::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            }),
            _ => None,
        };

        Self {
            client,
            source,
            client_id: azure.client_id.clone(),
        }
    }

    pub fn with_source(client: Client, source: IdentitySource, client_id: Option<String>) -> Self {
        Self {
            client,
            source: Some(source),
            client_id,
        }
    }

    pub fn source(&self) -> Option<&IdentitySource> {
        self.source.as_ref()
    }

    fn build_request(&self, source: &IdentitySource, resource: &str) -> reqwest::RequestBuilder {
        let (request, api_version) = match source {
            IdentitySource::AppService { endpoint, header } => (
                self.client.get(endpoint).header("X-IDENTITY-HEADER", header),
                APP_SERVICE_API_VERSION,
            ),
            IdentitySource::Imds { endpoint } => (
                self.client.get(endpoint).header("Metadata", "true"),
                IMDS_API_VERSION,
            ),
        };

        let mut query = vec![("api-version", api_version), ("resource", resource)];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }
        request.query(&query)
    }
}

fn expiry_of(token: &ManagedIdentityToken) -> DateTime<Utc> {
    if let Some(ts) = token.expires_on.as_ref().and_then(NumberOrString::as_i64) {
        if let Some(at) = DateTime::from_timestamp(ts, 0) {
            return at;
        }
    }
    let seconds = token
        .expires_in
        .as_ref()
        .and_then(NumberOrString::as_i64)
        .unwrap_or(0);
    Utc::now() + Duration::seconds(seconds)
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let Some(source) = &self.source else {
            return Err(CredentialError::unavailable(
                NAME,
                "no managed identity endpoint configured (IDENTITY_ENDPOINT/IDENTITY_HEADER unset, IMDS disabled)",
            ));
        };

        let resource = scope_to_resource(scope);
        debug!(source = ?source, resource = %resource, "Requesting managed identity token");

        let response = self
            .build_request(source, resource)
            .send()
            .await
            .map_err(|e| match source {
                // Nothing listening on the metadata address means we are not on a VM.
                IdentitySource::Imds { .. } if e.is_connect() => {
                    CredentialError::unavailable(NAME, format!("instance metadata endpoint unreachable: {}", e))
                }
                _ => CredentialError::unexpected(NAME, format!("token request failed: {}", e)),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::unexpected(NAME, format!("failed to read token response: {}", e)))?;

        if !status.is_success() {
            let message = format!("HTTP {}: {}", status, body);
            return match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Err(CredentialError::authentication(NAME, message))
                }
                _ => Err(CredentialError::unexpected(NAME, message)),
            };
        }

        let token: ManagedIdentityToken = serde_json::from_str(&body)
            .map_err(|e| CredentialError::unexpected(NAME, format!("invalid token response: {}", e)))?;
        let expires_on = expiry_of(&token);

        Ok(AccessToken::new(token.access_token, expires_on))
    }
}
