use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::{HealthResponse, StateSnapshot};

/// Typed HTTP client for the relay's pull-style endpoints.
#[derive(Debug, Clone)]
pub struct StateClient {
    http: Client,
    base_url: Url,
}

impl StateClient {
    /// Create a new `StateClient` rooted at `base_url` (e.g. `http://relay:5000`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /state` – last known state of every registered entity.
    pub async fn fetch_state(&self) -> Result<StateSnapshot, ClientError> {
        let url = self.base_url.join("/state")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /health` – server version and subscriber count.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = self.base_url.join("/health")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
