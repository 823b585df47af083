//! Upstream transport abstraction and its reqwest implementation.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::UpstreamError;
use crate::{IcalFilterError, Result, version};

/// A successful upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub body: Bytes,
    pub status: u16,
}

/// Performs the actual network call for a key.
///
/// Implementations must report any non-2xx response as
/// [`UpstreamError::Status`], keeping the body for diagnostics.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<Payload, UpstreamError>;
}

/// [`Transport`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client identifying itself as `icalfilter/<version>`.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(version::user_agent())
            .build()
            .map_err(|e| {
                IcalFilterError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> std::result::Result<Payload, UpstreamError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Body(e.to_string()))?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Payload {
            body,
            status: status.as_u16(),
        })
    }
}
