//! HTTP remote service client

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

use super::{RemoteError, RemoteService};

/// Remote service reached over HTTP with JSON bodies
pub struct HttpRemote {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRemote {
    /// Create a client for `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Absolute endpoints are used as-is, others are joined to the base URL
    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    fn classify(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout.as_millis() as u64)
        } else {
            RemoteError::Transport(err.to_string())
        }
    }

    async fn decode(&self, response: Response) -> Result<Value, RemoteError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("error").to_string(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }

        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(&self, endpoint: &str, param: Option<&str>) -> Result<Value, RemoteError> {
        let url = self.url(endpoint);
        debug!(url = %url, param = ?param, "GET");

        let mut request = self.client.get(&url);
        if let Some(param) = param {
            request = request.query(&[(param, "true")]);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let value = self.decode(response).await?;
        trace!(url = %url, response = %value, "GET completed");
        Ok(value)
    }

    async fn put(&self, endpoint: &str, body: &Value) -> Result<Value, RemoteError> {
        let url = self.url(endpoint);
        debug!(url = %url, body = %body, "PUT");

        let response = self
            .client
            .put(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let value = self.decode(response).await?;
        trace!(url = %url, response = %value, "PUT completed");
        Ok(value)
    }
}
