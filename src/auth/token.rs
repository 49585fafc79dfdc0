use crate::auth::error::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;

/// Time-limited credential attached to every authenticated call
pub struct BearerToken {
    secret: SecretString,
    expires_at: DateTime<Utc>,
}

impl BearerToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            expires_at,
        }
    }

    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True while `at` is strictly before the expiry instant
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at < self.expires_at
    }
}

impl Clone for BearerToken {
    fn clone(&self) -> Self {
        Self {
            secret: SecretString::from(self.secret.expose_secret().to_string()),
            expires_at: self.expires_at,
        }
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// TokenHandler trait defining how callers obtain the bearer credential
#[async_trait]
pub trait TokenHandler: Send + Sync + 'static {
    /// Fetch a fresh token from the identity endpoint, replacing any cached one
    async fn init_token(&self) -> Result<BearerToken, AuthError>;

    /// Return the cached token, refreshing it first if it has expired
    async fn bearer_token(&self) -> Result<BearerToken, AuthError>;

    /// Replace a token the platform refused.
    ///
    /// When another caller already swapped `rejected` for a newer token, that
    /// token is returned without a new exchange.
    async fn renew_token(&self, _rejected: &BearerToken) -> Result<BearerToken, AuthError> {
        self.init_token().await
    }

    /// Drop the cached session. Safe to call repeatedly.
    async fn end(&self);
}

/// Implementation of TokenHandler trait for Arc<T> where T implements TokenHandler
///
/// This allows one handler to be shared by the platform client and the connector.
#[async_trait]
impl<T: TokenHandler + ?Sized> TokenHandler for Arc<T> {
    async fn init_token(&self) -> Result<BearerToken, AuthError> {
        (**self).init_token().await
    }

    async fn bearer_token(&self) -> Result<BearerToken, AuthError> {
        (**self).bearer_token().await
    }

    async fn renew_token(&self, rejected: &BearerToken) -> Result<BearerToken, AuthError> {
        (**self).renew_token(rejected).await
    }

    async fn end(&self) {
        (**self).end().await
    }
}
