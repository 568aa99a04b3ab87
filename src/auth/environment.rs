use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{AccessToken, CredentialError, TokenCredential};
use crate::config::AzureConfig;

const NAME: &str = "EnvironmentCredential";

/// Client-secret credential built from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`
/// and `AZURE_CLIENT_SECRET`.
#[derive(Clone)]
pub struct EnvironmentCredential {
    client: Client,
    authority_host: String,
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: super::NumberOrString,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl EnvironmentCredential {
    pub fn new(client: Client, azure: &AzureConfig) -> Self {
        Self {
            client,
            authority_host: azure.authority_host.clone(),
            tenant_id: azure.tenant_id.clone(),
            client_id: azure.client_id.clone(),
            client_secret: azure.client_secret.clone(),
        }
    }

    fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority_host, tenant_id)
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let (tenant_id, client_id, client_secret) =
            match (&self.tenant_id, &self.client_id, &self.client_secret) {
                (Some(tenant), Some(client), Some(secret)) => (tenant, client, secret),
                _ => {
                    return Err(CredentialError::unavailable(
                        NAME,
                        "AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET must all be set",
                    ))
                }
            };

        let url = self.token_url(tenant_id);
        debug!(url = %url, "Requesting client credentials token");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::unexpected(NAME, format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::unexpected(NAME, format!("failed to read token response: {}", e)))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => format!("HTTP {}: {}", status, body),
            };
            return match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Err(CredentialError::authentication(NAME, message))
                }
                _ => Err(CredentialError::unexpected(NAME, message)),
            };
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| CredentialError::unexpected(NAME, format!("invalid token response: {}", e)))?;
        let expires_in = token.expires_in.as_i64().unwrap_or(0);

        Ok(AccessToken::new(
            token.access_token,
            Utc::now() + Duration::seconds(expires_in),
        ))
    }
}
