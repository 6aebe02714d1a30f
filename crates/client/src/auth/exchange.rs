//! Credential exchange against the OAuth token endpoint

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pimsdk_domain::{
    ClientConfig, HttpMethod, PimError, RemoteErrorBody, RequestBody, Result, TokenResponse,
};
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use crate::transport::{Transport, TransportRequest};

/// OAuth grant used for one exchange
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    /// `client_credentials`
    ClientCredentials,
    /// `password` (the grant Akeneo requires for API connections)
    Password { username: String, password: String },
    /// `refresh_token`
    RefreshToken(String),
}

impl Grant {
    /// Primary grant implied by the configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                Self::Password { username: username.clone(), password: password.clone() }
            }
            _ => Self::ClientCredentials,
        }
    }

    #[must_use]
    pub const fn grant_type(&self) -> &'static str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::Password { .. } => "password",
            Self::RefreshToken(_) => "refresh_token",
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            Self::ClientCredentials => json!({ "grant_type": "client_credentials" }),
            Self::Password { username, password } => json!({
                "grant_type": "password",
                "username": username,
                "password": password,
            }),
            Self::RefreshToken(token) => json!({
                "grant_type": "refresh_token",
                "refresh_token": token,
            }),
        }
    }
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            other => f.write_str(other.grant_type()),
        }
    }
}

/// Trades client credentials for an access token
///
/// This trait allows dependency injection and testing with mock exchanges.
/// Implementations perform exactly one attempt; the token manager owns
/// retries.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self, grant: &Grant) -> Result<TokenResponse>;
}

/// Token endpoint client speaking the Akeneo OAuth dialect
///
/// `POST {token_url}` with HTTP Basic `client_id:client_secret` and a JSON
/// grant body.
pub struct HttpCredentialExchange {
    transport: Arc<dyn Transport>,
    token_url: Url,
    basic_auth: String,
    timeout: Duration,
}

impl HttpCredentialExchange {
    /// Create an exchange for the configured token endpoint
    ///
    /// # Errors
    /// Returns `PimError::Config` when the token URL is invalid.
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let credentials = format!("{}:{}", config.client_id, config.client_secret);
        Ok(Self {
            transport,
            token_url: config.token_endpoint()?,
            basic_auth: format!("Basic {}", STANDARD.encode(credentials)),
            timeout: config.timeout(),
        })
    }

    fn map_failure(status: u16, body: &[u8], retry_after: Option<Duration>) -> PimError {
        let remote = RemoteErrorBody::parse(body);
        let description = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error_description").and_then(|d| d.as_str()).map(str::to_string));
        let message = remote
            .message
            .or(description)
            .unwrap_or_else(|| format!("token endpoint returned status {status}"));

        match status {
            400 | 401 | 403 | 422 => PimError::Authentication { status: Some(status), message },
            429 => PimError::RateLimited { retry_after, message },
            _ => PimError::Api { status, message },
        }
    }
}

#[async_trait]
impl CredentialExchange for HttpCredentialExchange {
    #[instrument(skip(self, grant), fields(grant_type = grant.grant_type()))]
    async fn exchange(&self, grant: &Grant) -> Result<TokenResponse> {
        let request = TransportRequest {
            method: HttpMethod::Post,
            url: self.token_url.clone(),
            headers: vec![("Authorization".to_string(), self.basic_auth.clone())],
            body: RequestBody::Json(grant.body()),
            timeout: self.timeout,
        };

        let outcome = self.transport.send(request).await?;
        if !outcome.is_success() {
            return Err(Self::map_failure(outcome.status, &outcome.body, outcome.retry_after()));
        }

        let token: TokenResponse = outcome.json().map_err(|err| PimError::Authentication {
            status: Some(outcome.status),
            message: format!("malformed token response: {err}"),
        })?;
        debug!(expires_in = token.expires_in, "credential exchange succeeded");
        Ok(token)
    }
}
