// crates/network/src/credentials.rs
//! Bearer credential sources

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Supplies the bearer token attached to outgoing requests
///
/// Obtaining or refreshing the token is the host application's business;
/// the gateway only asks for whatever is current.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns the current token, or `None` to send the request without one
    async fn bearer_token(&self) -> Option<String>;
}

/// A fixed token (or none at all)
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    /// Uses `token` for every request
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Sends requests without an `Authorization` header
    pub fn none() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// A token the host can swap at runtime, e.g. after re-authenticating
#[derive(Debug, Default)]
pub struct SharedCredentials {
    token: RwLock<Option<String>>,
}

impl SharedCredentials {
    /// Creates an empty credential slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new token
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    /// Drops the current token
    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

#[async_trait]
impl CredentialProvider for SharedCredentials {
    async fn bearer_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }
}
