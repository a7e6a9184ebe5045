use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::types::ProviderError;

/// A provider request after wire-format construction.
#[derive(Clone, Debug)]
pub struct WireRequest {
    pub url: String,
    pub bearer: Option<String>,
    pub body: Value,
}

#[derive(Clone, Debug)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, ProviderError>;
}

/// reqwest-backed transport. Timeouts are enforced by the caller, which drops
/// this future to abort the request.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, ProviderError> {
        let mut builder = self
            .client
            .post(&request.url)
            .header("Content-Type", "application/json")
            .json(&request.body);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        let resp = builder.send().await.map_err(network_error)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(network_error)?;
        Ok(WireResponse { status, body })
    }
}

// Gemini keys travel in the query string, so URLs never reach error text.
fn network_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::Timeout;
    }
    ProviderError::Network(err.without_url().to_string())
}
