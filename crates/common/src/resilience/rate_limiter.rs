//! Rolling-window rate limiter
//!
//! Keeps the grant time of every slot handed out during the last `period`.
//! A new slot is granted only while fewer than `limit` grants fall inside the
//! window, so no `period`-long interval ever sees more than `limit` calls,
//! regardless of where the interval starts.
//!
//! Callers that find the window full suspend until the oldest grant ages
//! out. Nothing is ever rejected; calls are only delayed.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{saturating_millis, ResilienceError, ResilienceResult};

/// Longest pause a single `penalize` call can impose
pub const MAX_PENALTY: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for the rate limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Maximum number of calls per window
    pub limit: u32,
    /// Length of the rolling window
    pub period: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { limit: 20, period: Duration::from_secs(60) }
    }
}

impl RateLimiterConfig {
    pub fn new(limit: u32, period: Duration) -> Self {
        Self { limit, period }
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `ResilienceError::InvalidConfiguration` for a zero limit or
    /// period.
    pub fn validate(&self) -> ResilienceResult<()> {
        if self.limit == 0 {
            return Err(ResilienceError::invalid("limit must be greater than 0"));
        }
        if self.period.is_zero() {
            return Err(ResilienceError::invalid("period must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct WindowState {
    /// Grant instants inside the current window, oldest first
    grants: VecDeque<Instant>,
    /// No slot is handed out before this instant (remote 429 penalty)
    blocked_until: Option<Instant>,
}

impl WindowState {
    fn evict(&mut self, now: Instant, period: Duration) {
        while let Some(&oldest) = self.grants.front() {
            if oldest + period <= now {
                self.grants.pop_front();
            } else {
                break;
            }
        }
    }

    /// Grant a slot at `now`, or report how long to wait before asking again.
    fn try_grant(&mut self, now: Instant, config: &RateLimiterConfig) -> Result<(), Duration> {
        if let Some(until) = self.blocked_until {
            if now < until {
                return Err(until - now);
            }
            self.blocked_until = None;
        }

        self.evict(now, config.period);
        if self.grants.len() < config.limit as usize {
            self.grants.push_back(now);
            return Ok(());
        }

        match self.grants.front() {
            Some(&oldest) => Err((oldest + config.period) - now),
            None => Err(config.period),
        }
    }
}

/// Shared rolling-window rate limiter
///
/// One instance per client, shared by `Arc` between the async client, the
/// blocking adapter and every concurrent task.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use pimsdk_common::resilience::RateLimiter;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = RateLimiter::new(20, Duration::from_secs(60))?;
/// limiter.acquire_slot().await;
/// assert_eq!(limiter.available(), 19);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` calls per rolling `period`
    ///
    /// # Errors
    /// Returns `ResilienceError::InvalidConfiguration` for a zero limit or
    /// period.
    pub fn new(limit: u32, period: Duration) -> ResilienceResult<Self> {
        Self::from_config(RateLimiterConfig::new(limit, period))
    }

    /// Create a limiter from a configuration
    ///
    /// # Errors
    /// Returns `ResilienceError::InvalidConfiguration` when validation fails.
    pub fn from_config(config: RateLimiterConfig) -> ResilienceResult<Self> {
        config.validate()?;
        Ok(Self { config, state: Mutex::new(WindowState::default()) })
    }

    #[must_use]
    pub const fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Wait until a slot is available, then take it.
    ///
    /// The lock is only held for the check-and-record step; waiting happens
    /// outside of it.
    pub async fn acquire_slot(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                match state.try_grant(Instant::now(), &self.config) {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            debug!(wait_ms = saturating_millis(wait), "rate limit window full, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a slot if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.state.lock().try_grant(Instant::now(), &self.config).is_ok()
    }

    /// Apply a server-imposed pause.
    ///
    /// No slot is handed out until `retry_after` has elapsed. A shorter
    /// penalty never shortens one already in force. Pauses longer than
    /// [`MAX_PENALTY`] are clamped to it.
    pub fn penalize(&self, retry_after: Duration) {
        let retry_after = retry_after.min(MAX_PENALTY);
        let Some(until) = Instant::now().checked_add(retry_after) else {
            return;
        };
        let mut state = self.state.lock();
        let extended = state.blocked_until.map_or(true, |current| until > current);
        if extended {
            state.blocked_until = Some(until);
            warn!(
                retry_after_ms = saturating_millis(retry_after),
                "remote rate limit hit, pausing local slots"
            );
        }
    }

    /// Slots that could be granted right now.
    #[must_use]
    pub fn available(&self) -> u32 {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.blocked_until.is_some_and(|until| now < until) {
            return 0;
        }
        state.evict(now, self.config.period);
        let used = u32::try_from(state.grants.len()).unwrap_or(u32::MAX);
        self.config.limit.saturating_sub(used)
    }

    /// Time until the next slot frees up; zero when one is available.
    #[must_use]
    pub fn time_until_available(&self) -> Duration {
        let now = Instant::now();
        let mut state = self.state.lock();
        let penalty =
            state.blocked_until.map_or(Duration::ZERO, |until| until.saturating_duration_since(now));
        state.evict(now, self.config.period);
        let window = if state.grants.len() < self.config.limit as usize {
            Duration::ZERO
        } else {
            state.grants.front().map_or(Duration::ZERO, |&oldest| {
                (oldest + self.config.period).saturating_duration_since(now)
            })
        };
        penalty.max(window)
    }
}
