use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{AccessToken, CredentialError, TokenCredential};

/// Ordered list of credential providers; the first one to produce a token wins.
///
/// Providers that report [`CredentialError::Unavailable`] are skipped. Any other
/// failure ends the walk and is returned as-is.
#[derive(Clone)]
pub struct ChainedTokenCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedTokenCredential {
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl TokenCredential for ChainedTokenCredential {
    fn name(&self) -> &'static str {
        "ChainedTokenCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        info!(scope = %scope, "Attempting to acquire access token");
        let mut reasons = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    info!(
                        credential = source.name(),
                        expires_on = %token.expires_on,
                        "Acquired access token"
                    );
                    return Ok(token);
                }
                Err(e) if e.is_unavailable() => {
                    debug!(credential = source.name(), reason = %e, "Credential unavailable, trying next");
                    reasons.push(e.to_string());
                }
                Err(e) => {
                    error!(credential = source.name(), error = %e, "Credential failed");
                    return Err(e);
                }
            }
        }

        warn!(attempted = self.sources.len(), "Credential chain exhausted");
        Err(CredentialError::Exhausted { reasons })
    }
}
