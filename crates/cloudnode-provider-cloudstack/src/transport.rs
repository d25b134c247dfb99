//! reqwest-backed HTTP transport

use async_trait::async_trait;
use cloudnode_core::{CloudStackConfig, Error, HttpResponse, HttpTransport, Result};
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport bound to one CloudStack endpoint
///
/// Sends each request exactly once. Status codes are passed through
/// untouched; classifying them is the connection's job.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestTransport {
    /// Create a transport for `endpoint` with the default timeout
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a transport for `endpoint` with a custom request timeout
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Create a transport for the endpoint described by `config`
    pub fn from_config(config: &CloudStackConfig) -> Result<Self> {
        Self::new(config.endpoint())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, params: &[(String, String)]) -> Result<HttpResponse> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(params)
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response body: {}", e)))?;

        tracing::trace!("HTTP {} from {} ({} bytes)", status, self.endpoint, body.len());
        Ok(HttpResponse { status, body })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
