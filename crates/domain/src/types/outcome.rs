//! Attempt outcomes
//!
//! The raw result of one transport exchange. The dispatcher returns the
//! outcome of the successful attempt; decoding is left to the caller.

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::constants::MAX_RETRY_AFTER_SECS;
use crate::errors::{PimError, Result};

/// Raw response of a single transport attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub status: u16,
    /// Header names are stored lower-cased
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub elapsed: Duration,
    /// 1-based attempt number within the logical call
    pub attempt: u32,
}

impl AttemptOutcome {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        let headers = headers.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
        Self { status, headers, body: body.into(), elapsed: Duration::ZERO, attempt: 1 }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// First header value with the given (case-insensitive) name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// `Location` header of a create response.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// `Retry-After` header as a duration (delta-seconds form only).
    ///
    /// Values above [`MAX_RETRY_AFTER_SECS`] are clamped to it.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        let secs = self.header("retry-after")?.trim().parse::<f64>().ok()?;
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let cap = Duration::from_secs(MAX_RETRY_AFTER_SECS);
        Some(Duration::try_from_secs_f64(secs).map_or(cap, |delay| delay.min(cap)))
    }

    /// Body is empty or whitespace only (204 responses, bare 201s).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Decode the body as JSON.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<T>`
    /// targets accept 204 responses.
    ///
    /// # Errors
    /// Returns `PimError::Decode` when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.is_empty() {
            return serde_json::from_value(serde_json::Value::Null).map_err(|_| {
                PimError::Decode(format!(
                    "empty response body (status {}) cannot be decoded into the requested type",
                    self.status
                ))
            });
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| PimError::Decode(format!("failed to parse response: {e}")))
    }

    /// Body as UTF-8 text, invalid sequences replaced.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Raw body bytes (media downloads).
    #[must_use]
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }
}
