//! Configuration types for the CloudNode client
//!
//! This module defines the connection and polling settings consumed by the
//! CloudStack driver. Settings can be deserialized from any serde format or
//! loaded from `CLOUDSTACK_*` environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API path on the management server
pub const DEFAULT_API_PATH: &str = "/client/api";

/// Connection settings for a CloudStack endpoint
///
/// # Security
///
/// The Debug implementation does NOT expose the secret key.
#[derive(Clone, Serialize, Deserialize)]
pub struct CloudStackConfig {
    /// API key identifying the caller (sent as `apiKey`)
    pub api_key: String,

    /// Shared secret used to sign requests
    /// ⚠️ NEVER log this value
    pub secret_key: String,

    /// Management server host name
    pub host: String,

    /// API path on the host
    #[serde(default = "default_path")]
    pub path: String,

    /// Use HTTPS when true
    #[serde(default = "default_secure")]
    pub secure: bool,

    /// Explicit port (defaults to the scheme's port)
    #[serde(default)]
    pub port: Option<u16>,

    /// Job polling settings
    #[serde(default)]
    pub poll: PollConfig,
}

impl std::fmt::Debug for CloudStackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudStackConfig")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<REDACTED>")
            .field("host", &self.host)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("port", &self.port)
            .field("poll", &self.poll)
            .finish()
    }
}

impl CloudStackConfig {
    /// Create a configuration with default path, scheme and polling
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            host: host.into(),
            path: default_path(),
            secure: default_secure(),
            port: None,
            poll: PollConfig::default(),
        }
    }

    /// Set the API path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Use plain HTTP instead of HTTPS
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set an explicit port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Replace the polling settings
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Load configuration from environment variables
    ///
    /// | Variable | Required | Default |
    /// |---|---|---|
    /// | `CLOUDSTACK_API_KEY` | yes | |
    /// | `CLOUDSTACK_SECRET_KEY` | yes | |
    /// | `CLOUDSTACK_HOST` | yes | |
    /// | `CLOUDSTACK_PATH` | no | `/client/api` |
    /// | `CLOUDSTACK_SECURE` | no | `true` |
    /// | `CLOUDSTACK_PORT` | no | scheme default |
    /// | `CLOUDSTACK_POLL_INTERVAL_SECS` | no | `1` |
    /// | `CLOUDSTACK_POLL_TIMEOUT_SECS` | no | unbounded |
    pub fn from_env() -> Result<Self, crate::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, crate::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| crate::Error::config(format!("{} is required", key)))
        };

        let config = Self {
            api_key: required("CLOUDSTACK_API_KEY")?,
            secret_key: required("CLOUDSTACK_SECRET_KEY")?,
            host: required("CLOUDSTACK_HOST")?,
            path: lookup("CLOUDSTACK_PATH").unwrap_or_else(default_path),
            secure: match lookup("CLOUDSTACK_SECURE") {
                Some(v) => parse_bool("CLOUDSTACK_SECURE", &v)?,
                None => default_secure(),
            },
            port: lookup("CLOUDSTACK_PORT")
                .map(|v| parse_number("CLOUDSTACK_PORT", &v))
                .transpose()?,
            poll: PollConfig {
                interval_secs: lookup("CLOUDSTACK_POLL_INTERVAL_SECS")
                    .map(|v| parse_number("CLOUDSTACK_POLL_INTERVAL_SECS", &v))
                    .transpose()?
                    .unwrap_or_else(default_poll_interval_secs),
                timeout_secs: lookup("CLOUDSTACK_POLL_TIMEOUT_SECS")
                    .map(|v| parse_number("CLOUDSTACK_POLL_TIMEOUT_SECS", &v))
                    .transpose()?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_key.is_empty() {
            return Err(crate::Error::config("CloudStack API key cannot be empty"));
        }
        if self.secret_key.is_empty() {
            return Err(crate::Error::config("CloudStack secret key cannot be empty"));
        }
        if self.host.is_empty() {
            return Err(crate::Error::config("CloudStack host cannot be empty"));
        }
        if self.host.contains("://") || self.host.contains('/') {
            return Err(crate::Error::config(format!(
                "CloudStack host must be a bare host name, got: {}",
                self.host
            )));
        }
        if !self.path.starts_with('/') {
            return Err(crate::Error::config(format!(
                "CloudStack API path must start with '/', got: {}",
                self.path
            )));
        }
        self.poll.validate()
    }

    /// Full endpoint URL, e.g. `https://cloud.example.com/client/api`
    pub fn endpoint(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        match self.port {
            Some(port) => format!("{}://{}:{}{}", scheme, self.host, port, self.path),
            None => format!("{}://{}{}", scheme, self.host, self.path),
        }
    }
}

/// Settings for polling asynchronous jobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between `queryAsyncJobResult` calls (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound on the total wait for one job (in seconds)
    ///
    /// `None` waits until the job reaches a terminal state.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl PollConfig {
    /// Validate the polling settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.timeout_secs == Some(0) {
            return Err(crate::Error::config("Poll timeout must be > 0 when set"));
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Poll timeout as a [`Duration`]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            timeout_secs: None,
        }
    }
}

fn default_path() -> String {
    DEFAULT_API_PATH.to_string()
}

fn default_secure() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn parse_bool(key: &str, value: &str) -> Result<bool, crate::Error> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(crate::Error::config(format!(
            "{} must be a boolean, got: {}",
            key, value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, crate::Error> {
    value
        .trim()
        .parse()
        .map_err(|_| crate::Error::config(format!("{} must be a number, got: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied_from_lookup() {
        let config = CloudStackConfig::from_lookup(lookup(&[
            ("CLOUDSTACK_API_KEY", "key"),
            ("CLOUDSTACK_SECRET_KEY", "secret"),
            ("CLOUDSTACK_HOST", "cloud.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.path, "/client/api");
        assert!(config.secure);
        assert_eq!(config.port, None);
        assert_eq!(config.poll.interval(), Duration::from_secs(1));
        assert_eq!(config.poll.timeout(), None);
        assert_eq!(config.endpoint(), "https://cloud.example.com/client/api");
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = CloudStackConfig::from_lookup(lookup(&[
            ("CLOUDSTACK_API_KEY", "key"),
            ("CLOUDSTACK_SECRET_KEY", "secret"),
            ("CLOUDSTACK_HOST", "10.0.0.5"),
            ("CLOUDSTACK_PATH", "/api"),
            ("CLOUDSTACK_SECURE", "false"),
            ("CLOUDSTACK_PORT", "8080"),
            ("CLOUDSTACK_POLL_INTERVAL_SECS", "5"),
            ("CLOUDSTACK_POLL_TIMEOUT_SECS", "600"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint(), "http://10.0.0.5:8080/api");
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.poll.timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_missing_secret_rejected() {
        let result = CloudStackConfig::from_lookup(lookup(&[
            ("CLOUDSTACK_API_KEY", "key"),
            ("CLOUDSTACK_HOST", "cloud.example.com"),
        ]));

        match result {
            Err(crate::Error::Config(msg)) => assert!(msg.contains("CLOUDSTACK_SECRET_KEY")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_port_rejected() {
        let result = CloudStackConfig::from_lookup(lookup(&[
            ("CLOUDSTACK_API_KEY", "key"),
            ("CLOUDSTACK_SECRET_KEY", "secret"),
            ("CLOUDSTACK_HOST", "cloud.example.com"),
            ("CLOUDSTACK_PORT", "http"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_host_with_scheme_rejected() {
        let config = CloudStackConfig::new("key", "secret", "https://cloud.example.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = CloudStackConfig::new("key", "secret", "cloud.example.com").with_poll(
            PollConfig {
                interval_secs: 1,
                timeout_secs: Some(0),
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = CloudStackConfig::new("key", "secret", "cloud.example.com").with_poll(
            PollConfig {
                interval_secs: 0,
                timeout_secs: Some(1),
            },
        );

        match config.validate() {
            Err(crate::Error::Config(msg)) => assert!(msg.contains("interval")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_interval_from_env_rejected() {
        let result = CloudStackConfig::from_lookup(|key: &str| match key {
            "CLOUDSTACK_API_KEY" => Some("key".to_string()),
            "CLOUDSTACK_SECRET_KEY" => Some("secret".to_string()),
            "CLOUDSTACK_HOST" => Some("cloud.example.com".to_string()),
            "CLOUDSTACK_POLL_INTERVAL_SECS" => Some("0".to_string()),
            _ => None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: CloudStackConfig = serde_json::from_value(serde_json::json!({
            "api_key": "key",
            "secret_key": "secret",
            "host": "cloud.example.com",
            "poll": { "timeout_secs": 30 }
        }))
        .unwrap();

        assert_eq!(config.path, DEFAULT_API_PATH);
        assert_eq!(config.poll.interval_secs, 1);
        assert_eq!(config.poll.timeout_secs, Some(30));
    }

    #[test]
    fn test_secret_not_exposed_in_debug() {
        let config = CloudStackConfig::new("key", "super_secret_value", "cloud.example.com");
        let debug_str = format!("{:?}", config);

        assert!(!debug_str.contains("super_secret_value"));
        assert!(debug_str.contains("<REDACTED>"));
    }
}
