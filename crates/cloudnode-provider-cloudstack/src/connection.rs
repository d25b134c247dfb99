//! Signed connection to the CloudStack API
//!
//! Signs each parameter set, sends it through an [`HttpTransport`], maps
//! error statuses and decodes the body as JSON. This is the only place
//! transport-level failures surface; nothing here retries.

use crate::signer::Signer;
use cloudnode_core::{Error, HttpResponse, HttpTransport, Params, Result};
use serde_json::Value;
use std::sync::Arc;

/// Driver name attached to errors and logs
pub const DRIVER_NAME: &str = "cloudstack";

/// A decoded response body and the text it was decoded from
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub value: Value,
    /// Body exactly as received, for error reports
    pub body: String,
}

/// Authenticated connection to one CloudStack endpoint
#[derive(Clone)]
pub struct Connection {
    signer: Signer,
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("signer", &self.signer)
            .field("endpoint", &self.transport.endpoint())
            .finish()
    }
}

impl Connection {
    pub fn new(signer: Signer, transport: Arc<dyn HttpTransport>) -> Self {
        Self { signer, transport }
    }

    /// Endpoint requests are sent to
    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Sign `params`, send them and decode the JSON body
    ///
    /// # Returns
    ///
    /// - `Ok(ApiReply)`: The decoded and raw body of a 2xx response
    /// - `Err(Error::MalformedResponse)`: The body was not valid JSON
    /// - `Err(Error)`: Transport failure or a non-2xx status
    pub async fn request(&self, params: Params) -> Result<ApiReply> {
        let signed = self.signer.sign(params)?;
        let response = self.transport.get(&signed).await?;

        if !response.is_success() {
            return Err(classify_status(&response));
        }

        match serde_json::from_str(&response.body) {
            Ok(value) => Ok(ApiReply {
                value,
                body: response.body,
            }),
            Err(e) => Err(Error::malformed(
                format!("Failed to parse JSON: {}", e),
                response.body,
                DRIVER_NAME,
            )),
        }
    }
}

/// Map a non-2xx response to an error
fn classify_status(response: &HttpResponse) -> Error {
    let status = response.status;
    let detail = error_text(&response.body).unwrap_or_else(|| response.body.clone());

    match status {
        401 | 403 => Error::auth(format!(
            "Invalid API key or signature. Status: {} - {}",
            status, detail
        )),
        404 => Error::not_found(format!("API endpoint not found. Status: {} - {}", status, detail)),
        429 => Error::rate_limited(format!(
            "Rate limit exceeded. Please retry later. Status: {}",
            status
        )),
        500..=599 => Error::provider(
            DRIVER_NAME,
            format!("CloudStack server error (transient): {} - {}", status, detail),
        ),
        _ => Error::http(format!("Request failed: {} - {}", status, detail)),
    }
}

/// `errortext` from a CloudStack error envelope
///
/// Errors arrive as `{"<command>response": {"errorcode": 431, "errortext": "..."}}`.
fn error_text(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.as_object()?
        .values()
        .find_map(|v| v.get("errortext")?.as_str().map(str::to_string))
}
