use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

pub const DEFAULT_PORT: u16 = 7071;
pub const DEFAULT_WORK_ITEM_TYPE: &str = "Task";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: String,
    pub port: u16,
    pub log_level: String,
    pub json_logs: bool,
    /// Request timeout in seconds, applied to the router and the outbound client
    pub request_timeout: u64,
    /// Function-level key required on inbound webhooks. `None` disables the check.
    pub function_key: Option<String>,
    pub azure: AzureConfig,
    pub devops: DevOpsConfig,
}

/// Identity settings consumed by the credential chain
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authority_host: String,
    /// App Service / Functions managed identity endpoint
    pub identity_endpoint: Option<String>,
    pub identity_header: Option<String>,
    /// Fall back to the VM instance metadata endpoint when no identity endpoint is set
    pub imds_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevOpsConfig {
    pub org_url: Option<String>,
    pub project: Option<String>,
    pub default_work_item_type: String,
}

/// Organization and project a work item is created in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevOpsTarget<'a> {
    pub org_url: &'a str,
    pub project: &'a str,
}

impl DevOpsConfig {
    /// Both the organization URL and the project must be set before any call is made.
    pub fn target(&self) -> Option<DevOpsTarget<'_>> {
        match (self.org_url.as_deref(), self.project.as_deref()) {
            (Some(org_url), Some(project)) => Some(DevOpsTarget { org_url, project }),
            _ => None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Config {
            environment: var("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            port: var("PORT")
                .map(|port| port.parse())
                .transpose()
                .map_err(|e| anyhow::anyhow!("PORT must be a valid port number: {}", e))?
                .unwrap_or(DEFAULT_PORT),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            json_logs: var("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            request_timeout: var("REQUEST_TIMEOUT")
                .map(|timeout| timeout.parse())
                .transpose()
                .map_err(|e| anyhow::anyhow!("REQUEST_TIMEOUT must be a number of seconds: {}", e))?
                .unwrap_or(30),
            function_key: var("FUNCTION_KEY"),
            azure: AzureConfig {
                tenant_id: var("AZURE_TENANT_ID"),
                client_id: var("AZURE_CLIENT_ID"),
                client_secret: var("AZURE_CLIENT_SECRET"),
                authority_host: var("AZURE_AUTHORITY_HOST")
                    .map(|host| host.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
                identity_endpoint: var("IDENTITY_ENDPOINT"),
                identity_header: var("IDENTITY_HEADER"),
                imds_enabled: var("AZURE_IMDS_ENABLED")
                    .map(|flag| flag.parse())
                    .transpose()
                    .map_err(|e| anyhow::anyhow!("AZURE_IMDS_ENABLED must be true or false: {}", e))?
                    .unwrap_or(false),
            },
            devops: DevOpsConfig {
                org_url: var("DEVOPS_ORG_URL"),
                project: var("DEVOPS_PROJECT_NAME"),
                default_work_item_type: var("DEFAULT_WORK_ITEM_TYPE")
                    .unwrap_or_else(|| DEFAULT_WORK_ITEM_TYPE.to_string()),
            },
        })
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("json_logs", &self.json_logs)
            .field("request_timeout", &self.request_timeout)
            .field("function_key", &redact(&self.function_key))
            .field("azure", &self.azure)
            .field("devops", &self.devops)
            .finish()
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("authority_host", &self.authority_host)
            .field("identity_endpoint", &self.identity_endpoint)
            .field("identity_header", &redact(&self.identity_header))
            .field("imds_enabled", &self.imds_enabled)
            .finish()
    }
}
