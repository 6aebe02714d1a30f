//! Request dispatcher
//!
//! Executes one logical call: rate-limiter slot, credential, transport
//! attempt, retry decision, repeated until the policy says succeed or fail.
//! Slots are taken per attempt and never held while waiting out a backoff.

use std::sync::Arc;
use std::time::Duration;

use pimsdk_common::resilience::{saturating_millis, RateLimiter};
use pimsdk_domain::constants::MAX_RETRY_AFTER_SECS;
use pimsdk_domain::{AttemptOutcome, Credential, PimError, RequestDescriptor, Result};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::TokenManager;
use crate::retry::{RetryCause, RetryDecision, RetryPolicy, RetryState};
use crate::transport::{Transport, TransportRequest};

/// Single-call executor shared by every higher-level component
pub struct Dispatcher {
    base_url: Url,
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenManager>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    /// Bound on each transport attempt
    timeout: Duration,
    /// Bound on a whole logical call unless the descriptor sets its own
    default_deadline: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        base_url: Url,
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenManager>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            base_url,
            transport,
            tokens,
            limiter,
            policy,
            timeout: Duration::from_secs(pimsdk_domain::constants::DEFAULT_TIMEOUT_SECS),
            default_deadline: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.default_deadline = deadline;
        self
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Execute one logical call
    ///
    /// Returns the outcome of the first successful attempt.
    ///
    /// # Errors
    /// The classified error of the last attempt once the retry policy gives
    /// up, or `PimError::Timeout` when the call deadline passes first. A
    /// deadline abandons the in-flight attempt without consulting the policy.
    #[instrument(
        skip(self, descriptor),
        fields(
            call_id = %Uuid::new_v4(),
            method = %descriptor.method(),
            path = %descriptor.path(),
        )
    )]
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<AttemptOutcome> {
        let started = Instant::now();
        match descriptor.deadline_override().or(self.default_deadline) {
            Some(deadline) => match tokio::time::timeout(deadline, self.run(descriptor)).await {
                Ok(result) => result,
                Err(_) => {
                    let elapsed = started.elapsed();
                    warn!(elapsed_ms = saturating_millis(elapsed), "logical call deadline exceeded");
                    Err(PimError::Timeout { elapsed })
                }
            },
            None => self.run(descriptor).await,
        }
    }

    /// Execute and decode the response body as JSON.
    ///
    /// # Errors
    /// Same as [`Dispatcher::execute`], plus `PimError::Decode`.
    pub async fn execute_json<T: DeserializeOwned>(&self, descriptor: &RequestDescriptor) -> Result<T> {
        self.execute(descriptor).await?.json()
    }

    async fn run(&self, descriptor: &RequestDescriptor) -> Result<AttemptOutcome> {
        let url = resolve_url(&self.base_url, descriptor)?;
        let mut state = RetryState::default();

        loop {
            self.limiter.acquire_slot().await;
            let credential = self.tokens.get_valid_credential().await?;
            let attempt = state.attempts();

            let started = Instant::now();
            let result = self
                .transport
                .send(self.attempt_request(descriptor, &url, &credential))
                .await
                .map(|mut outcome| {
                    outcome.elapsed = started.elapsed();
                    outcome.attempt = attempt;
                    outcome
                });

            match self.policy.evaluate(result, descriptor, &mut state) {
                RetryDecision::Succeed(outcome) => {
                    debug!(
                        status = outcome.status,
                        attempt,
                        elapsed_ms = saturating_millis(outcome.elapsed),
                        "request succeeded"
                    );
                    return Ok(outcome);
                }
                RetryDecision::Fail(err) => {
                    warn!(attempt, category = err.category().label(), error = %err, "request failed");
                    return Err(err);
                }
                RetryDecision::Retry { delay, cause, error } => {
                    let delay = delay.min(Duration::from_secs(MAX_RETRY_AFTER_SECS));
                    match cause {
                        RetryCause::CredentialRejected => {
                            self.tokens.invalidate(&credential.access_token);
                        }
                        RetryCause::RateLimited => self.limiter.penalize(delay),
                        RetryCause::Network | RetryCause::Server => {}
                    }
                    warn!(
                        attempt,
                        cause = cause.label(),
                        delay_ms = saturating_millis(delay),
                        error = %error,
                        "retrying request"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    fn attempt_request(
        &self,
        descriptor: &RequestDescriptor,
        url: &Url,
        credential: &Credential,
    ) -> TransportRequest {
        let mut headers = Vec::with_capacity(descriptor.headers().len() + 1);
        headers.push(("Authorization".to_string(), credential.authorization()));
        headers.extend(descriptor.headers().iter().cloned());
        TransportRequest {
            method: descriptor.method(),
            url: url.clone(),
            headers,
            body: descriptor.request_body().clone(),
            timeout: self.timeout,
        }
    }
}

/// Absolute URL for a descriptor.
///
/// `http(s)://` paths (pagination links) are taken verbatim; anything else is
/// appended to the base URL. Descriptor query parameters are appended in order.
pub(crate) fn resolve_url(base: &Url, descriptor: &RequestDescriptor) -> Result<Url> {
    let mut url = if descriptor.is_absolute() {
        Url::parse(descriptor.path())?
    } else {
        let root = base.as_str().trim_end_matches('/');
        let path = descriptor.path().trim_start_matches('/');
        Url::parse(&format!("{root}/{path}"))?
    };

    if !descriptor.query_params().is_empty() {
        url.query_pairs_mut()
            .extend_pairs(descriptor.query_params().iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    Ok(url)
}
