// # HTTP Transport Trait
//
// The generic HTTP connection a driver sends its signed requests through.
// Connection pooling, TLS and socket-level behavior live behind this trait;
// drivers only see status codes and raw bodies.
//
// ## Implementations
//
// - reqwest-based: `ReqwestTransport` in `cloudnode-provider-cloudstack`
// - Test doubles that replay canned responses

use async_trait::async_trait;

/// Query parameters of one request, in transmission order
pub type Params = Vec<(String, String)>;

/// Raw HTTP response as seen by a driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Undecoded response body
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 response with the given body
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for HTTP transports
///
/// A transport is bound to one endpoint (scheme, host, port, path) when it
/// is built. Each call sends exactly one request and never retries; callers
/// decide what a failure means.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a GET request carrying `params` as the query string
    ///
    /// # Returns
    ///
    /// - `Ok(HttpResponse)`: Any response the server produced, including non-2xx
    /// - `Err(Error)`: The request could not be sent or the body could not be read
    async fn get(&self, params: &[(String, String)]) -> Result<HttpResponse, crate::Error>;

    /// Endpoint this transport talks to (for logging)
    fn endpoint(&self) -> &str;
}
