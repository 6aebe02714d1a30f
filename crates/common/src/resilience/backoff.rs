//! Exponential backoff with jitter

use std::time::Duration;

use rand::Rng;

use super::{saturating_millis, ResilienceError, ResilienceResult};

/// Jitter type for adding randomness to retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// No jitter
    None,
    /// Full jitter: 0 to calculated_delay
    Full,
    /// Equal jitter: calculated_delay/2 to calculated_delay
    #[default]
    Equal,
}

impl Jitter {
    /// Apply jitter to the calculated delay
    #[must_use]
    pub fn apply(self, delay: Duration) -> Duration {
        let millis = saturating_millis(delay);
        match self {
            Self::None => delay,
            Self::Full => Duration::from_millis(random_up_to(millis)),
            Self::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + random_up_to(millis - half))
            }
        }
    }
}

fn random_up_to(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=max)
}

/// Exponential backoff: `base * 2^attempt`, capped at `max`, then jittered
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use pimsdk_common::resilience::{Backoff, Jitter};
///
/// let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(30))
///     .unwrap()
///     .with_jitter(Jitter::None);
/// assert_eq!(backoff.delay(0), Duration::from_millis(500));
/// assert_eq!(backoff.delay(2), Duration::from_secs(2));
/// assert_eq!(backoff.delay(20), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: Jitter,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { base: Duration::from_millis(500), max: Duration::from_secs(30), jitter: Jitter::Equal }
    }
}

impl Backoff {
    /// Create an exponential backoff with equal jitter
    ///
    /// # Errors
    /// Returns `ResilienceError::InvalidConfiguration` when `base` is zero or
    /// exceeds `max`.
    pub fn new(base: Duration, max: Duration) -> ResilienceResult<Self> {
        if base.is_zero() {
            return Err(ResilienceError::invalid("base delay must be greater than zero"));
        }
        if base > max {
            return Err(ResilienceError::invalid("base delay must not exceed max delay"));
        }
        Ok(Self { base, max, jitter: Jitter::Equal })
    }

    #[must_use]
    pub const fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }

    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Capped delay before jitter for the given retry (0-based).
    #[must_use]
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.checked_mul(factor).map_or(self.max, |delay| delay.min(self.max))
    }

    /// Jittered delay for the given retry (0-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.raw_delay(attempt))
    }
}
