//! HTTP implementations of the collaborator gateways.
//!
//! Every gateway speaks JSON with camelCase field names. Transport failures,
//! timeouts and non-success statuses are mapped to [`GatewayError`] so the
//! orchestrator can tell transient failures from permanent ones.

mod cart;
mod order;
mod product;
mod wallet;

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::GatewayError;

pub use cart::HttpCartGateway;
pub use order::HttpOrderGateway;
pub use product::HttpProductGateway;
pub use wallet::HttpWalletGateway;

/// Settings shared by every HTTP gateway.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Client-side request timeout.
    pub timeout: Duration,
    /// Bearer token forwarded to services that require one.
    pub auth_token: Option<String>,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            auth_token: None,
        }
    }
}

/// A `reqwest` client bound to one service's base URL.
#[derive(Debug, Clone)]
struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    auth_token: Option<String>,
}

impl ServiceClient {
    fn new(base_url: impl Into<String>, config: &HttpGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: config.timeout,
            auth_token: config.auth_token.clone(),
        })
    }

    fn url(&self, path: impl std::fmt::Display) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        request.send().await.map_err(|e| self.map_error(e))
    }

    fn map_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Turns a non-success response into the matching [`GatewayError`].
async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(GatewayError::NotFound);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Rejected {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    response
        .json()
        .await
        .map_err(|e| GatewayError::Decode(e.to_string()))
}
