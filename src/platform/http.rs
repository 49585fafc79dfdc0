use crate::auth::TokenHandler;
use crate::credentials::Credentials;
use crate::platform::error::ApiError;
use crate::platform::platform::Platform;
use crate::platform::resource::{ApiBase, ResourceKind, API_VERSION};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT_SECS: u64 = 120;
const PAGE_SIZE: &str = "100";
const HREF_BASE: &str = "http://localhost/";

/// Shared HTTP client for the identity endpoint and the platform
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
}

/// Real Platform implementation over the platform's REST API
pub struct HttpPlatform {
    client: Client,
    tokens: Arc<dyn TokenHandler>,
    api_url: String,
    platform_url: String,
}

impl HttpPlatform {
    pub fn new(client: Client, tokens: Arc<dyn TokenHandler>, credentials: &Credentials) -> Self {
        Self {
            client,
            tokens,
            api_url: credentials.api_url().to_string(),
            platform_url: credentials.platform_url().to_string(),
        }
    }

    fn url(&self, kind: ResourceKind, suffix: &str) -> String {
        let base = match kind.base() {
            ApiBase::Api => &self.api_url,
            ApiBase::Platform => &self.platform_url,
        };
        format!("{}{}{}", base, kind.path(), suffix)
    }

    fn query(space_id: Option<&str>) -> Vec<(String, String)> {
        let mut query = vec![("version".to_string(), API_VERSION.to_string())];
        if let Some(space_id) = space_id {
            query.push(("space_id".to_string(), space_id.to_string()));
        }
        query
    }

    /// Send one request with the current bearer token.
    ///
    /// A 401 triggers one forced token refresh and one resend.
    async fn send<F>(&self, kind: ResourceKind, id: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let token = self.tokens.bearer_token().await?;
        let response = build(token.expose())
            .send()
            .await
            .map_err(|e| transport(kind, e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Platform rejected bearer token on {}, refreshing", kind);
            let token = self.tokens.renew_token(&token).await?;
            let response = build(token.expose())
                .send()
                .await
                .map_err(|e| transport(kind, e))?;
            return classify(kind, id, response).await;
        }

        classify(kind, id, response).await
    }

    async fn json(kind: ResourceKind, response: Response) -> Result<Value, ApiError> {
        response.json().await.map_err(|e| ApiError::Decode {
            kind,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Platform for HttpPlatform {
    async fn list(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        filters: &[(&str, &str)],
    ) -> Result<Vec<Value>, ApiError> {
        let url = self.url(kind, "");
        let mut query = Self::query(space_id);
        query.extend(filters.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        query.push(("limit".to_string(), PAGE_SIZE.to_string()));

        let mut resources = Vec::new();
        let mut start: Option<String> = None;
        loop {
            let mut page_query = query.clone();
            if let Some(start) = &start {
                page_query.push(("start".to_string(), start.clone()));
            }

            debug!("Listing {} resources from {}", kind, url);
            let response = self
                .send(kind, "", |token| {
                    self.client.get(&url).bearer_auth(token).query(&page_query)
                })
                .await?;
            let doc = Self::json(kind, response).await?;

            let page = doc
                .get(kind.list_field())
                .and_then(Value::as_array)
                .ok_or_else(|| ApiError::Decode {
                    kind,
                    reason: format!("missing '{}' array", kind.list_field()),
                })?;
            resources.extend(page.iter().cloned());

            match next_start(&doc) {
                Some(next) if start.as_deref() != Some(next.as_str()) => start = Some(next),
                _ => break,
            }
        }

        Ok(resources)
    }

    async fn get(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
    ) -> Result<Value, ApiError> {
        let url = self.url(kind, &format!("/{}", id));
        let query = Self::query(space_id);

        let response = self
            .send(kind, id, |token| {
                self.client.get(&url).bearer_auth(token).query(&query)
            })
            .await?;
        Self::json(kind, response).await
    }

    async fn create(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        body: Value,
    ) -> Result<Value, ApiError> {
        let url = self.url(kind, "");
        let query = Self::query(space_id);

        debug!("Creating {} at {}", kind, url);
        let response = self
            .send(kind, "", |token| {
                self.client
                    .post(&url)
                    .bearer_auth(token)
                    .query(&query)
                    .json(&body)
            })
            .await?;
        Self::json(kind, response).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
    ) -> Result<(), ApiError> {
        let url = self.url(kind, &format!("/{}", id));
        let mut query = Self::query(space_id);
        if kind == ResourceKind::Job {
            query.push(("hard_delete".to_string(), "true".to_string()));
        }

        debug!("Deleting {} {}", kind, id);
        self.send(kind, id, |token| {
            self.client.delete(&url).bearer_auth(token).query(&query)
        })
        .await?;
        Ok(())
    }

    async fn upload_content(
        &self,
        kind: ResourceKind,
        space_id: Option<&str>,
        id: &str,
        content: Bytes,
    ) -> Result<(), ApiError> {
        let url = self.url(kind, &format!("/{}/content", id));
        let mut query = Self::query(space_id);
        query.push(("content_format".to_string(), "native".to_string()));

        debug!("Uploading {} bytes of content to {} {}", content.len(), kind, id);
        self.send(kind, id, |token| {
            self.client
                .put(&url)
                .bearer_auth(token)
                .query(&query)
                .header("Content-Type", "application/octet-stream")
                .body(content.clone())
        })
        .await?;
        Ok(())
    }
}

fn transport(kind: ResourceKind, error: reqwest::Error) -> ApiError {
    ApiError::Transport {
        kind,
        reason: error.to_string(),
    }
}

async fn classify(kind: ResourceKind, id: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    Err(match status {
        StatusCode::NOT_FOUND => ApiError::NotFound {
            kind,
            id: id.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized { kind, message },
        s if s.is_server_error()
            || s == StatusCode::TOO_MANY_REQUESTS
            || s == StatusCode::REQUEST_TIMEOUT =>
        {
            ApiError::Transport {
                kind,
                reason: format!("{}: {}", status, message),
            }
        }
        _ => ApiError::Rejected {
            kind,
            status: status.as_u16(),
            message,
        },
    })
}

/// Remote error text from `errors[0].message` or `message`, else the raw body
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|doc| {
            doc.pointer("/errors/0/message")
                .or_else(|| doc.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// `start` token of the next page, taken from `next.href`
fn next_start(doc: &Value) -> Option<String> {
    let href = doc.pointer("/next/href").and_then(Value::as_str)?;
    // Relative hrefs resolve against a placeholder origin
    let url = Url::parse(HREF_BASE).ok()?.join(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "start")
        .map(|(_, start)| start.into_owned())
        .filter(|start| !start.is_empty())
}
