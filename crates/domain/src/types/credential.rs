//! Bearer credentials
//!
//! Defines the access credential held by the token manager and the token
//! endpoint response it is built from.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access token with its absolute expiry
///
/// Only the token manager creates or replaces credentials; everything else
/// receives clones.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    /// Bearer token sent in the `Authorization` header
    pub access_token: String,

    /// Token type (always "Bearer" for the PIM API)
    pub token_type: String,

    /// Absolute expiration timestamp (UTC)
    pub expires_at: DateTime<Utc>,

    /// Refresh token for the `refresh_token` grant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    /// Build a credential that expires `expires_in` seconds from `issued_at`.
    #[must_use]
    pub fn issued(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: issued_at + chrono::Duration::seconds(response.expires_in.max(0)),
            refresh_token: response.refresh_token,
        }
    }

    /// Check if the token is expired or will expire within `buffer`
    ///
    /// # Returns
    /// `true` once `now >= expires_at - buffer`
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: std::time::Duration) -> bool {
        let Ok(buffer) = chrono::Duration::from_std(buffer) else {
            return true;
        };
        match self.expires_at.checked_sub_signed(buffer) {
            Some(refresh_at) => now >= refresh_at,
            None => true,
        }
    }

    /// Get seconds until token expiration (negative once expired)
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Token endpoint response
///
/// Standard OAuth 2.0 token response format (RFC 6749).
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}
