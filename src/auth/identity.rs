use crate::auth::error::AuthError;
use crate::auth::token::BearerToken;
use crate::credentials::{Credentials, HostedSecret};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, TimeZone, Utc};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Lifetime assumed for hosted tokens whose payload carries no `exp` claim
const HOSTED_TOKEN_FALLBACK_LIFETIME_HOURS: i64 = 12;

/// One request/response exchange of configured credentials for a bearer token
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn request_token(&self) -> Result<BearerToken, AuthError>;

    /// URL of the identity endpoint, for error reporting
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    async fn request_token(&self) -> Result<BearerToken, AuthError> {
        (**self).request_token().await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// Build the identity provider matching the credential shape
pub fn identity_for(credentials: &Credentials, client: Client) -> Arc<dyn IdentityProvider> {
    match credentials {
        Credentials::Public(c) => Arc::new(IamIdentity {
            client,
            endpoint: format!("{}/identity/token", c.iam_url),
            api_key: SecretString::from(c.api_key.expose_secret().to_string()),
        }),
        Credentials::Hosted(c) => {
            let secret = match &c.secret {
                HostedSecret::Password(p) => {
                    HostedSecret::Password(SecretString::from(p.expose_secret().to_string()))
                }
                HostedSecret::ApiKey(k) => {
                    HostedSecret::ApiKey(SecretString::from(k.expose_secret().to_string()))
                }
            };
            Arc::new(HostedIdentity {
                client,
                endpoint: format!("{}/icp4d-api/v1/authorize", c.url),
                username: c.username.clone(),
                secret,
            })
        }
    }
}

/// Public-cloud IAM exchange of an API key for an access token
pub struct IamIdentity {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

#[derive(Deserialize)]
struct IamTokenResponse {
    access_token: String,
    /// Epoch seconds
    expiration: i64,
}

#[async_trait]
impl IdentityProvider for IamIdentity {
    async fn request_token(&self) -> Result<BearerToken, AuthError> {
        debug!("Requesting IAM token from {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", IAM_GRANT_TYPE),
                ("apikey", self.api_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Transport {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let response = check_status(&self.endpoint, response).await?;
        let body: IamTokenResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::InvalidResponse {
                    endpoint: self.endpoint.clone(),
                    reason: e.to_string(),
                })?;

        let expires_at = Utc
            .timestamp_opt(body.expiration, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidResponse {
                endpoint: self.endpoint.clone(),
                reason: format!("invalid expiration {}", body.expiration),
            })?;

        Ok(BearerToken::new(body.access_token, expires_at))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Software-hosted exchange of username plus password or API key
pub struct HostedIdentity {
    client: Client,
    endpoint: String,
    username: String,
    secret: HostedSecret,
}

#[derive(Deserialize)]
struct HostedTokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    async fn request_token(&self) -> Result<BearerToken, AuthError> {
        debug!("Requesting hosted platform token from {}", self.endpoint);

        let body = match &self.secret {
            HostedSecret::Password(p) => {
                json!({ "username": self.username, "password": p.expose_secret() })
            }
            HostedSecret::ApiKey(k) => {
                json!({ "username": self.username, "api_key": k.expose_secret() })
            }
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Transport {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let response = check_status(&self.endpoint, response).await?;
        let body: HostedTokenResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::InvalidResponse {
                    endpoint: self.endpoint.clone(),
                    reason: e.to_string(),
                })?;

        let expires_at = jwt_expiry(&body.token)
            .unwrap_or_else(|| Utc::now() + Duration::hours(HOSTED_TOKEN_FALLBACK_LIFETIME_HOURS));

        Ok(BearerToken::new(body.token, expires_at))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

async fn check_status(endpoint: &str, response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        Err(AuthError::Transport {
            endpoint: endpoint.to_string(),
            reason: format!("{}: {}", status, message),
        })
    } else {
        Err(AuthError::Rejected {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

/// Expiry read from the `exp` claim of a JWT payload
pub(crate) fn jwt_expiry(token: &str) -> Option<chrono::DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let decoded = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: JwtClaims = serde_json::from_slice(&decoded).ok()?;
    Utc.timestamp_opt(claims.exp?, 0).single()
}
