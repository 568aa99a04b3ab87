use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{AccessToken, CredentialError, NumberOrString, TokenCredential};

const NAME: &str = "AzureCliCredential";

/// Upper bound on a single `az` invocation
pub const CLI_TIMEOUT: Duration = Duration::from_secs(10);

/// Developer credential that borrows the signed-in `az` session.
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
    tenant_id: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
    #[serde(default, rename = "expires_on")]
    expires_on_unix: Option<NumberOrString>,
}

impl AzureCliCredential {
    pub fn new(tenant_id: Option<String>) -> Self {
        Self {
            program: "az".to_string(),
            tenant_id,
            timeout: CLI_TIMEOUT,
        }
    }

    /// Override the executable, mainly for tests.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken, CredentialError> {
    let token: CliToken = serde_json::from_slice(stdout)
        .map_err(|e| CredentialError::unexpected(NAME, format!("unexpected az output: {}", e)))?;

    let unix = token
        .expires_on_unix
        .as_ref()
        .and_then(NumberOrString::as_i64)
        .and_then(|ts| DateTime::from_timestamp(ts, 0));

    // Older CLI releases only report local wall-clock time.
    let local = || {
        let raw = token.expires_on.as_deref()?;
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .single()
            .map(|at| at.with_timezone(&Utc))
    };

    let expires_on = unix
        .or_else(local)
        .ok_or_else(|| CredentialError::unexpected(NAME, "az output has no usable expiry"))?;

    Ok(AccessToken::new(token.access_token, expires_on))
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut command = Command::new(&self.program);
        command.args(["account", "get-access-token", "--output", "json", "--scope", scope]);
        if let Some(tenant) = &self.tenant_id {
            command.args(["--tenant", tenant.as_str()]);
        }
        debug!(program = %self.program, "Requesting token from Azure CLI");

        // The child must not outlive a dropped request.
        command.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                CredentialError::unexpected(
                    NAME,
                    format!("Azure CLI did not respond within {}s", self.timeout.as_secs_f64()),
                )
            })?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    CredentialError::unavailable(NAME, "Azure CLI not found on PATH")
                }
                _ => CredentialError::unexpected(NAME, format!("failed to run Azure CLI: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("az login") || stderr.contains("az account set") {
                return Err(CredentialError::unavailable(
                    NAME,
                    "not logged in, run `az login` to set up an account",
                ));
            }
            return Err(CredentialError::authentication(NAME, stderr));
        }

        parse_cli_token(&output.stdout)
    }
}
