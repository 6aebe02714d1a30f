//! Resilience patterns for talking to quota-bound remote APIs
//!
//! - **Rate Limiter**: rolling-window quota shared by every caller of a client
//! - **Backoff**: exponential retry delays with a cap and jitter
//!
//! Both are driven by `tokio::time`, so tests can pause and advance time
//! deterministically with `#[tokio::test(start_paused = true)]`.

pub mod backoff;
pub mod rate_limiter;

use std::time::Duration;

use thiserror::Error;

pub use backoff::{Backoff, Jitter};
pub use rate_limiter::{RateLimiter, RateLimiterConfig, MAX_PENALTY};

/// Errors raised while building resilience components
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResilienceError {
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl ResilienceError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration { message: message.into() }
    }
}

pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Whole milliseconds of `duration`, saturating at `u64::MAX`.
#[must_use]
pub fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
