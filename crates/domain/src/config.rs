//! Client configuration
//!
//! `ClientConfig` is the single configuration surface of the SDK. Loading it
//! from the environment or a file lives in `pimsdk-client::config`; this
//! module only defines the shape, the defaults and validation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_BULK_BATCH_SIZE,
    DEFAULT_BULK_CONCURRENCY, DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_CALLS,
    DEFAULT_RATE_LIMIT_PERIOD_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_TOKEN_BUFFER_SECS, TOKEN_PATH,
};
use crate::errors::{PimError, Result};

/// Configuration for a PIM client instance
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root URL of the PIM instance (e.g. `https://pim.example.com`)
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Username for the password grant; client-credentials grant when absent
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Token endpoint override; defaults to `{base_url}/api/oauth/v1/token`
    #[serde(default)]
    pub token_url: Option<String>,
    /// Per-attempt transport timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_token_buffer")]
    pub token_buffer_seconds: u64,
    #[serde(default = "default_rate_limit_calls")]
    pub rate_limit_calls: u32,
    #[serde(default = "default_rate_limit_period")]
    pub rate_limit_period_seconds: u64,
    /// Default deadline for a logical call (all attempts included)
    #[serde(default)]
    pub deadline_seconds: Option<u64>,
    /// Opt in to retrying non-idempotent writes on server errors
    #[serde(default)]
    pub retry_writes: bool,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
    /// Items per native bulk request
    #[serde(default = "default_bulk_batch_size")]
    pub bulk_batch_size: usize,
    /// Concurrent logical calls in per-item bulk mode
    #[serde(default = "default_bulk_concurrency")]
    pub bulk_concurrency: usize,
    #[serde(default)]
    pub user_agent: Option<String>,
}

const fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
const fn default_token_buffer() -> u64 {
    DEFAULT_TOKEN_BUFFER_SECS
}
const fn default_rate_limit_calls() -> u32 {
    DEFAULT_RATE_LIMIT_CALLS
}
const fn default_rate_limit_period() -> u64 {
    DEFAULT_RATE_LIMIT_PERIOD_SECS
}
const fn default_backoff_base() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}
const fn default_backoff_max() -> u64 {
    DEFAULT_BACKOFF_MAX_MS
}
const fn default_bulk_batch_size() -> usize {
    DEFAULT_BULK_BATCH_SIZE
}
const fn default_bulk_concurrency() -> usize {
    DEFAULT_BULK_CONCURRENCY
}

impl ClientConfig {
    /// Configuration with the required fields set and every option defaulted.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: None,
            password: None,
            token_url: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            token_buffer_seconds: DEFAULT_TOKEN_BUFFER_SECS,
            rate_limit_calls: DEFAULT_RATE_LIMIT_CALLS,
            rate_limit_period_seconds: DEFAULT_RATE_LIMIT_PERIOD_SECS,
            deadline_seconds: None,
            retry_writes: false,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            bulk_batch_size: DEFAULT_BULK_BATCH_SIZE,
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
            user_agent: None,
        }
    }

    /// Use the password grant with the given user.
    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `PimError::Config` for missing credentials, an unparsable
    /// base URL, or zero-valued quotas/timeouts.
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| PimError::Config(format!("invalid base_url '{}': {e}", self.base_url)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(PimError::Config(format!(
                "base_url must use http or https, got '{}'",
                base.scheme()
            )));
        }
        if let Some(token_url) = &self.token_url {
            Url::parse(token_url)
                .map_err(|e| PimError::Config(format!("invalid token_url '{token_url}': {e}")))?;
        }
        if self.client_id.trim().is_empty() {
            return Err(PimError::Config("client_id must not be empty".into()));
        }
        if self.client_secret.is_empty() {
            return Err(PimError::Config("client_secret must not be empty".into()));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(PimError::Config("username and password must be set together".into()));
        }
        if self.timeout == 0 {
            return Err(PimError::Config("timeout must be greater than 0".into()));
        }
        if self.rate_limit_calls == 0 {
            return Err(PimError::Config("rate_limit_calls must be greater than 0".into()));
        }
        if self.rate_limit_period_seconds == 0 {
            return Err(PimError::Config(
                "rate_limit_period_seconds must be greater than 0".into(),
            ));
        }
        if self.bulk_batch_size == 0 || self.bulk_concurrency == 0 {
            return Err(PimError::Config(
                "bulk_batch_size and bulk_concurrency must be greater than 0".into(),
            ));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(PimError::Config("backoff_base_ms must not exceed backoff_max_ms".into()));
        }
        Ok(())
    }

    /// Parsed base URL.
    ///
    /// # Errors
    /// Returns `PimError::Config` when `base_url` is not a valid URL.
    pub fn base(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    /// Token endpoint, explicit or derived from the base URL.
    ///
    /// A derived endpoint keeps any path on the base URL, the same way API
    /// paths are appended to it.
    ///
    /// # Errors
    /// Returns `PimError::Config` when the resulting URL is invalid.
    pub fn token_endpoint(&self) -> Result<Url> {
        match &self.token_url {
            Some(url) => Ok(Url::parse(url)?),
            None => {
                let base = self.base()?;
                let root = base.as_str().trim_end_matches('/');
                Ok(Url::parse(&format!("{root}/{}", TOKEN_PATH.trim_start_matches('/')))?)
            }
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    #[must_use]
    pub const fn token_buffer(&self) -> Duration {
        Duration::from_secs(self.token_buffer_seconds)
    }

    #[must_use]
    pub const fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(self.rate_limit_period_seconds)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_seconds.map(Duration::from_secs)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token_url", &self.token_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("token_buffer_seconds", &self.token_buffer_seconds)
            .field("rate_limit_calls", &self.rate_limit_calls)
            .field("rate_limit_period_seconds", &self.rate_limit_period_seconds)
            .field("deadline_seconds", &self.deadline_seconds)
            .field("retry_writes", &self.retry_writes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ClientConfig {
        ClientConfig::new("https://pim.example.com", "client", "secret")
    }

    #[test]
    fn test_defaults_match_remote_quota() {
        let config = valid();
        assert_eq!(config.rate_limit_calls, 20);
        assert_eq!(config.rate_limit_period(), Duration::from_secs(60));
        assert!(!config.retry_writes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serde_defaults_fill_optional_fields() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"base_url":"https://pim.example.com","client_id":"c","client_secret":"s"}"#,
        )
        .unwrap();
        assert_eq!(config, valid_with("c", "s"));
    }

    fn valid_with(id: &str, secret: &str) -> ClientConfig {
        ClientConfig::new("https://pim.example.com", id, secret)
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = valid();
        config.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(PimError::Config(_))));

        let mut config = valid();
        config.rate_limit_calls = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.username = Some("admin".into());
        assert!(config.validate().is_err());

        let config = valid().with_user("admin", "pw");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_endpoint_derivation() {
        let config = ClientConfig::new("https://pim.example.com/", "c", "s");
        assert_eq!(
            config.token_endpoint().unwrap().as_str(),
            "https://pim.example.com/api/oauth/v1/token"
        );

        for base in ["https://pim.example.com/tenant/", "https://pim.example.com/tenant"] {
            let config = ClientConfig::new(base, "c", "s");
            assert_eq!(
                config.token_endpoint().unwrap().as_str(),
                "https://pim.example.com/tenant/api/oauth/v1/token"
            );
        }

        let mut config = valid();
        config.token_url = Some("https://auth.example.com/token".into());
        assert_eq!(config.token_endpoint().unwrap().as_str(), "https://auth.example.com/token");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", valid().with_user("admin", "hunter2"));
        assert!(!rendered.contains("secret\""));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
