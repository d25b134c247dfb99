//! Request signing
//!
//! CloudStack authenticates every request with an HMAC-SHA1 signature over a
//! canonical form of the query parameters:
//!
//! 1. lower-case every key and sort the pairs by key
//! 2. URL-encode keys and values and join them as `k=v&k=v`
//! 3. lower-case the whole string and turn `+` (an encoded space) into `%20`
//! 4. HMAC-SHA1 with the secret key, then base64
//!
//! The server recomputes the same string, so any deviation in case folding or
//! encoding breaks every request.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cloudnode_core::{Error, Params, Result};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Parameter carrying the caller's API key
pub const API_KEY_PARAM: &str = "apiKey";

/// Parameter selecting the response format
pub const RESPONSE_PARAM: &str = "response";

/// Parameter carrying the signature
pub const SIGNATURE_PARAM: &str = "signature";

/// Signs requests with an API key / secret key pair
///
/// The Debug implementation does NOT expose the secret key.
#[derive(Clone)]
pub struct Signer {
    api_key: String,
    /// ⚠️ NEVER log this value
    secret_key: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<REDACTED>")
            .finish()
    }
}

impl Signer {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Add `apiKey`, `response=json` and `signature` to `params`
    ///
    /// Any caller-supplied values for those three keys are replaced.
    pub fn sign(&self, mut params: Params) -> Result<Params> {
        params.retain(|(k, _)| {
            k != API_KEY_PARAM && k != RESPONSE_PARAM && k != SIGNATURE_PARAM
        });
        params.push((API_KEY_PARAM.to_string(), self.api_key.clone()));
        params.push((RESPONSE_PARAM.to_string(), "json".to_string()));

        let signature = self.signature(&params)?;
        params.push((SIGNATURE_PARAM.to_string(), signature));
        Ok(params)
    }

    /// Base64 HMAC-SHA1 of the canonical string of `params`
    pub fn signature(&self, params: &[(String, String)]) -> Result<String> {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| Error::config(format!("HMAC-SHA1 key init failed: {}", e)))?;
        mac.update(canonical_string(params).as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// Canonical string the signature is computed over
pub fn canonical_string(params: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, &str)> = params
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.as_str()))
        .collect();
    // Stable, so duplicate keys keep their original order
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
        .to_lowercase()
        .replace('+', "%20")
}

fn encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_known_signature() {
        let signer = Signer::new("AbCdEf", "SeCrEt");
        let p = params(&[
            ("command", "listZones"),
            ("apiKey", "AbCdEf"),
            ("response", "json"),
        ]);

        assert_eq!(
            canonical_string(&p),
            "apikey=abcdef&command=listzones&response=json"
        );
        assert_eq!(signer.signature(&p).unwrap(), "iS6HuiTLI3eXTdPoXqr+8tYW8lo=");
    }

    #[test]
    fn test_known_signature_with_space_and_slash() {
        let signer = Signer::new("AbCdEf", "SeCrEt");
        let p = params(&[
            ("command", "deployVirtualMachine"),
            ("apiKey", "AbCdEf"),
            ("response", "json"),
            ("displayName", "my web/01"),
            ("zoneId", "1"),
        ]);

        assert_eq!(
            canonical_string(&p),
            "apikey=abcdef&command=deployvirtualmachine&displayname=my%20web%2f01&response=json&zoneid=1"
        );
        assert_eq!(signer.signature(&p).unwrap(), "bELkmMRE5Le35IBgp0+1x1r9wJU=");
    }

    #[test]
    fn test_space_encoded_as_percent_20() {
        let canonical = canonical_string(&params(&[("name", "two words")]));
        assert_eq!(canonical, "name=two%20words");
        assert!(!canonical.contains('+'));
    }

    #[test]
    fn test_signature_independent_of_key_order() {
        let signer = Signer::new("key", "secret");
        let a = params(&[("command", "listZones"), ("available", "true"), ("apiKey", "key")]);
        let b = params(&[("apiKey", "key"), ("available", "true"), ("command", "listZones")]);

        assert_eq!(signer.signature(&a).unwrap(), signer.signature(&b).unwrap());
    }

    #[test]
    fn test_signature_changes_with_value() {
        let signer = Signer::new("key", "secret");
        let a = params(&[("command", "listZones"), ("id", "1")]);
        let b = params(&[("command", "listZones"), ("id", "2")]);

        assert_ne!(signer.signature(&a).unwrap(), signer.signature(&b).unwrap());
    }

    #[test]
    fn test_sign_injects_auth_params() {
        let signer = Signer::new("AbCdEf", "SeCrEt");
        let signed = signer
            .sign(params(&[("command", "listZones"), ("response", "xml")]))
            .unwrap();

        assert_eq!(
            signed,
            params(&[
                ("command", "listZones"),
                ("apiKey", "AbCdEf"),
                ("response", "json"),
                ("signature", "iS6HuiTLI3eXTdPoXqr+8tYW8lo="),
            ])
        );
    }

    #[test]
    fn test_secret_not_exposed_in_debug() {
        let signer = Signer::new("key", "very_secret_value");
        let debug_str = format!("{:?}", signer);

        assert!(!debug_str.contains("very_secret_value"));
        assert!(debug_str.contains("Signer"));
    }
}
