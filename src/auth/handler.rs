use crate::auth::error::AuthError;
use crate::auth::identity::IdentityProvider;
use crate::auth::token::{BearerToken, TokenHandler};
use crate::retry::{retry, RetryPolicy};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// TokenHandler that caches one token and refreshes it lazily on read.
///
/// The cache lives behind an async mutex held across the identity call, so
/// concurrent readers that all find the token expired cause a single refresh.
pub struct CachedTokenHandler {
    identity: Arc<dyn IdentityProvider>,
    cached: Mutex<Option<BearerToken>>,
    retry: RetryPolicy,
    refresh_margin: Duration,
}

impl CachedTokenHandler {
    /// `refresh_margin` treats a token as expired that much before its real expiry
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        retry: RetryPolicy,
        refresh_margin: std::time::Duration,
    ) -> Self {
        Self {
            identity,
            cached: Mutex::new(None),
            retry,
            refresh_margin: Duration::from_std(refresh_margin).unwrap_or_else(|_| Duration::zero()),
        }
    }

    async fn fetch(&self) -> Result<BearerToken, AuthError> {
        let endpoint = self.identity.endpoint().to_string();
        let attempts = self.retry.attempts();

        let result = retry(
            &self.retry,
            "Token request",
            AuthError::is_transient,
            || self.identity.request_token(),
        )
        .await;

        match result {
            Ok(token) => {
                info!("Obtained bearer token valid until {}", token.expires_at());
                Ok(token)
            }
            Err(AuthError::Transport { reason, .. }) => Err(AuthError::Unreachable {
                endpoint,
                attempts,
                reason,
            }),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TokenHandler for CachedTokenHandler {
    async fn init_token(&self) -> Result<BearerToken, AuthError> {
        let mut cached = self.cached.lock().await;
        let token = self.fetch().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn bearer_token(&self) -> Result<BearerToken, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(Utc::now() + self.refresh_margin) {
                return Ok(token.clone());
            }
            debug!("Bearer token expired at {}, refreshing", token.expires_at());
        }

        let token = self.fetch().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn renew_token(&self, rejected: &BearerToken) -> Result<BearerToken, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expose() != rejected.expose() && token.is_valid_at(Utc::now()) {
                debug!("Bearer token already renewed by another caller");
                return Ok(token.clone());
            }
        }

        let token = self.fetch().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn end(&self) {
        if self.cached.lock().await.take().is_some() {
            debug!("Dropped cached bearer token");
        }
    }
}
