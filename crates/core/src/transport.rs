//! HTTP transport used to fetch connection details.

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::{Client, Url, header::CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

/// A JSON `POST` to a connection-details endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRequest {
    /// A same-origin path (`/api/connection-details`) or an absolute URL.
    pub target: String,
    /// Extra headers sent alongside `Content-Type: application/json`.
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl PostRequest {
    pub fn new(target: impl Into<String>, body: Value) -> Self {
        Self {
            target: target.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Sends JSON requests and returns the parsed JSON body.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, request: PostRequest) -> Result<Value, TransportError>;
}

/// An implementation of `HttpTransport` backed by `reqwest`, resolving
/// relative targets against the app origin.
pub struct ReqwestTransport {
    client: Client,
    origin: Url,
}

impl ReqwestTransport {
    pub fn new(origin: Url) -> Self {
        Self::with_client(Client::new(), origin)
    }

    pub fn with_client(client: Client, origin: Url) -> Self {
        Self { client, origin }
    }

    fn resolve(&self, target: &str) -> Result<Url, TransportError> {
        self.origin
            .join(target)
            .map_err(|e| TransportError::InvalidUrl(target.to_string(), e.to_string()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, request: PostRequest) -> Result<Value, TransportError> {
        let url = self.resolve(&request.target)?;
        let mut builder = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .json(&request.body)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
        // The status is not inspected: whatever body comes back is decoded as-is.
        debug!(%url, status = %response.status(), "Connection details response received");

        let bytes = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| TransportError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
