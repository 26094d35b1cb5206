//! The real fetch primitive that sits at the bottom of every chain.
//!
//! This module defines the abstraction over the network and an implementation
//! backed by `reqwest`. Mocks never reach it on their own: only an explicit
//! forward from a handler or a deferred request does.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderValue, USER_AGENT};

use crate::config::MockConfig;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;

/// The opaque network fetch at the root of the chain.
#[async_trait]
pub trait RealFetch: Send + Sync {
    /// Perform the request and return the buffered response.
    async fn fetch(&self, request: Request) -> Result<Response>;

    /// Get the name of this fetch implementation.
    fn name(&self) -> &str {
        "real"
    }
}

/// Real fetch over HTTP using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    client: Client,
}

impl HttpFetch {
    /// Create a fetch with a default client.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a fetch with a custom client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Create a fetch configured from a [`MockConfig`].
    pub fn from_config(config: &MockConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(agent) = &config.user_agent {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(USER_AGENT, HeaderValue::from_str(agent)?);
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Default for HttpFetch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealFetch for HttpFetch {
    async fn fetch(&self, request: Request) -> Result<Response> {
        let (method, url, headers, body) = request.into_parts();
        tracing::debug!(method = %method, url = %url, "Forwarding request to network");

        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        Response::from_reqwest(response).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
