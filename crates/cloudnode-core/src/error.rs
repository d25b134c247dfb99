//! Error types for the CloudNode client
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for CloudNode operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the CloudNode client
#[derive(Error, Debug)]
pub enum Error {
    /// The response body was not valid JSON, or did not have the expected shape
    #[error("Malformed response from {driver}: {message}")]
    MalformedResponse {
        /// What was wrong with the response
        message: String,
        /// Raw response body as received
        body: String,
        /// Name of the driver that issued the request
        driver: String,
    },

    /// An asynchronous job reached its failure state
    #[error("Job {job_id} for {command} failed: {payload}")]
    JobFailed {
        /// API command that submitted the job
        command: String,
        /// Server-assigned job id
        job_id: String,
        /// Failure payload returned by the job poll
        payload: serde_json::Value,
    },

    /// Polling a job exceeded the configured timeout
    #[error("Timed out waiting for job {job_id} after {elapsed_secs}s")]
    Timeout {
        /// Server-assigned job id
        job_id: String,
        /// Seconds spent polling before giving up
        elapsed_secs: u64,
    },

    /// The caller cancelled an in-flight request
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a malformed-response error
    pub fn malformed(
        message: impl Into<String>,
        body: impl Into<String>,
        driver: impl Into<String>,
    ) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            body: body.into(),
            driver: driver.into(),
        }
    }

    /// Create a job failure error
    pub fn job_failed(
        command: impl Into<String>,
        job_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::JobFailed {
            command: command.into(),
            job_id: job_id.into(),
            payload,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Raw response body, for errors that carry one
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::MalformedResponse { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
