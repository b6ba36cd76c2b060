//! Authentication hooks supplied by the caller of the remote repository.
//!
//! Token storage and login flows live outside this crate; the repository only
//! needs to read the current token, ask for a refresh after a 401, and signal
//! a forced logout when the refresh fails.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Current bearer token, if logged in
    fn access_token(&self) -> Option<String>;

    /// Whether `refresh` can be attempted after a 401
    fn supports_refresh(&self) -> bool {
        false
    }

    /// Obtain a fresh token
    async fn refresh(&self) -> Result<String> {
        Err(anyhow::anyhow!("Token refresh is not supported"))
    }

    /// Called when the session cannot be recovered
    fn logout(&self) {}
}

/// A fixed token with no refresh support, e.g. from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

#[async_trait]
impl AuthSession for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}
