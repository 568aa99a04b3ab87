//! Authentication for both directions of the service.
//!
//! - Outbound: a chain of [`TokenCredential`] providers that yields a bearer
//!   token for the Azure DevOps API (client secret, managed identity, Azure CLI).
//! - Inbound: the function-key middleware guarding the webhook route.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

pub mod azure_cli;
pub mod chain;
pub mod environment;
pub mod managed_identity;
pub mod middleware;

pub use azure_cli::AzureCliCredential;
pub use chain::ChainedTokenCredential;
pub use environment::EnvironmentCredential;
pub use managed_identity::{IdentitySource, ManagedIdentityCredential};

/// Static Azure DevOps resource id
pub const DEVOPS_RESOURCE_ID: &str = "499b84ac-1321-427f-aa17-267ca6975798";

/// Scope requested from the identity platform for Azure DevOps calls
pub const DEVOPS_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";

/// Bearer token issued by the identity platform.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// The raw bearer value
    pub fn secret(&self) -> &str {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_on
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Failure classes reported by a single credential provider.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The provider is not configured here; the chain moves on.
    #[error("{credential} unavailable: {reason}")]
    Unavailable {
        credential: &'static str,
        reason: String,
    },

    /// The provider is configured but the identity platform rejected it.
    #[error("{credential} authentication failed: {message}")]
    Authentication {
        credential: &'static str,
        message: String,
    },

    /// Transport or decoding failure while talking to the identity platform.
    #[error("{credential} failed unexpectedly: {message}")]
    Unexpected {
        credential: &'static str,
        message: String,
    },

    /// Every provider in the chain was unavailable.
    #[error("No credential in the chain could provide a token: {}", .reasons.join("; "))]
    Exhausted { reasons: Vec<String> },
}

impl CredentialError {
    pub fn unavailable(credential: &'static str, reason: impl Into<String>) -> Self {
        CredentialError::Unavailable {
            credential,
            reason: reason.into(),
        }
    }

    pub fn authentication(credential: &'static str, message: impl Into<String>) -> Self {
        CredentialError::Authentication {
            credential,
            message: message.into(),
        }
    }

    pub fn unexpected(credential: &'static str, message: impl Into<String>) -> Self {
        CredentialError::Unexpected {
            credential,
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CredentialError::Unavailable { .. })
    }
}

/// A single source of bearer tokens.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Try to acquire a token for `scope`.
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

/// Convert a v2 scope (`{resource}/.default`) into the v1 resource form
/// expected by the managed identity endpoints.
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Token endpoints disagree on whether timestamps are numbers or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NumberOrString {
    Number(i64),
    String(String),
}

impl NumberOrString {
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::String(s) => s.trim().parse().ok(),
        }
    }
}
