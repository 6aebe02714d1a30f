//! Error types used throughout the SDK
//!
//! Every failure a caller can observe is a [`PimError`]. The variants split
//! caller-fixable conditions (validation, not-found, authentication) from
//! transient ones (rate limiting, network) so callers can branch on
//! [`PimError::is_retryable`] instead of inspecting raw status codes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Categories of SDK errors, stable enough for metrics and log labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Credential rejected (401/403 or a failed credential exchange)
    Authentication,
    /// Request structurally rejected (400/422) or invalid search filter
    Validation,
    /// Resource absent (404)
    NotFound,
    /// Remote quota exceeded (429)
    RateLimit,
    /// Any other non-2xx response
    Api,
    /// Connection-level failure of a single attempt
    Network,
    /// Logical-call deadline exceeded
    Timeout,
    /// Invalid client configuration
    Config,
    /// Response body could not be decoded
    Decode,
    /// Invariant violation inside the SDK
    Internal,
}

impl ErrorCategory {
    /// Stable label suitable for metrics/logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::RateLimit => "rate_limit",
            Self::Api => "api",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Config => "config",
            Self::Decode => "decode",
            Self::Internal => "internal",
        }
    }
}

/// A single offending property reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Property or attribute code the remote API complained about
    pub property: String,
    /// Human-readable message from the remote API
    pub message: String,
}

/// Main error type for the SDK
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PimError {
    #[error("Authentication failed: {message}")]
    Authentication { status: Option<u16>, message: String },

    #[error("Validation failed: {message}")]
    Validation {
        status: Option<u16>,
        message: String,
        field: Option<String>,
        violations: Vec<FieldViolation>,
    },

    #[error("Not found: {path}: {message}")]
    NotFound { path: String, message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimited { retry_after: Option<Duration>, message: String },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String, timed_out: bool, request_sent: bool },

    #[error("Timeout after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PimError {
    /// Validation failure raised locally, before anything reaches the wire.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::Validation {
            status: None,
            violations: vec![FieldViolation { property: field.clone(), message: message.clone() }],
            field: Some(field),
            message,
        }
    }

    /// Connection-level failure where the request never reached the server.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Network { message: message.into(), timed_out: false, request_sent: false }
    }

    /// Get the error category for this error
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Api { .. } => ErrorCategory::Api,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Config(_) => ErrorCategory::Config,
            Self::Decode(_) => ErrorCategory::Decode,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the condition may clear up if the same request is sent again.
    ///
    /// Unclassified API errors count as transient; whether the dispatcher
    /// actually retries them also depends on the request's idempotency.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network { .. } | Self::Api { .. })
    }

    /// HTTP status attached to the error, when the remote API produced one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Validation { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided wait hint for rate-limit errors.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Offending field for validation errors.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Whether the caller can fix the condition by changing the request.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::NotFound { .. } | Self::Config(_))
    }
}

impl From<serde_json::Error> for PimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<url::ParseError> for PimError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid URL: {err}"))
    }
}

/// Error document returned by Akeneo-style APIs.
///
/// ```json
/// {"code": 422, "message": "Validation failed.", "errors": [{"property": "identifier", "message": "..."}]}
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<RemoteViolation>,
}

/// One entry of [`RemoteErrorBody::errors`].
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteViolation {
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RemoteErrorBody {
    /// Parse a response body, tolerating non-JSON payloads.
    #[must_use]
    pub fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// Field-level violations, attribute codes preferred over property names.
    #[must_use]
    pub fn violations(&self) -> Vec<FieldViolation> {
        self.errors
            .iter()
            .filter_map(|v| {
                let property = v.attribute.clone().or_else(|| v.property.clone())?;
                Some(FieldViolation { property, message: v.message.clone().unwrap_or_default() })
            })
            .collect()
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, PimError>;
