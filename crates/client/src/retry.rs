//! Retry policy
//!
//! Turns the result of one attempt into a decision for the logical call:
//! succeed, retry after a delay, or fail with a classified error.
//!
//! | condition | decision |
//! |-----------|----------|
//! | 2xx | succeed |
//! | 401/403 | one credential refresh and retry per call, then fail |
//! | 429 | retry after `Retry-After` (or backoff) |
//! | connection failure before sending | retry with backoff |
//! | timeout / reset after sending, 5xx, other non-2xx | retry with backoff if the request is idempotent or writes are opted in |
//! | 400/422, 404 | fail |
//!
//! Every retry except the credential refresh counts against `max_retries`.

use std::time::Duration;

use pimsdk_common::resilience::Backoff;
use pimsdk_domain::{AttemptOutcome, PimError, RemoteErrorBody, RequestDescriptor, Result};

/// Why an attempt is being repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    /// The API rejected the credential; refresh it first
    CredentialRejected,
    /// Remote quota exceeded; pause the local limiter too
    RateLimited,
    /// Transport-level failure
    Network,
    /// Non-2xx response that may be transient
    Server,
}

impl RetryCause {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CredentialRejected => "credential_rejected",
            Self::RateLimited => "rate_limited",
            Self::Network => "network",
            Self::Server => "server",
        }
    }
}

/// Decision for one attempt
#[derive(Debug)]
pub enum RetryDecision {
    Succeed(AttemptOutcome),
    Retry { delay: Duration, cause: RetryCause, error: PimError },
    Fail(PimError),
}

/// Per-call retry bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Retries consumed against `max_retries`
    pub retries: u32,
    /// The single credential refresh has been used
    pub credential_refreshed: bool,
}

impl RetryState {
    /// Attempts made so far, including the first one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.retries + 1 + if self.credential_refreshed { 1 } else { 0 }
    }
}

/// Retry rules for one client
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Backoff,
    retry_writes: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self { max_retries, backoff, retry_writes: false }
    }

    /// Retry non-idempotent requests on ambiguous failures too.
    #[must_use]
    pub const fn retry_writes(mut self, enabled: bool) -> Self {
        self.retry_writes = enabled;
        self
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide what to do with the result of one attempt.
    pub fn evaluate(
        &self,
        result: Result<AttemptOutcome>,
        descriptor: &RequestDescriptor,
        state: &mut RetryState,
    ) -> RetryDecision {
        let error = match result {
            Ok(outcome) if outcome.is_success() => return RetryDecision::Succeed(outcome),
            Ok(outcome) => classify(&outcome, descriptor.path()),
            Err(err) => err,
        };

        let may_resend = descriptor.method().is_idempotent()
            || descriptor.retry_writes_override().unwrap_or(self.retry_writes);

        let cause = match &error {
            PimError::Authentication { .. } => {
                if state.credential_refreshed {
                    return RetryDecision::Fail(error);
                }
                state.credential_refreshed = true;
                return RetryDecision::Retry {
                    delay: Duration::ZERO,
                    cause: RetryCause::CredentialRejected,
                    error,
                };
            }
            PimError::RateLimited { .. } => RetryCause::RateLimited,
            PimError::Network { request_sent: false, .. } => RetryCause::Network,
            PimError::Network { .. } if may_resend => RetryCause::Network,
            PimError::Api { .. } if may_resend => RetryCause::Server,
            _ => return RetryDecision::Fail(error),
        };

        if state.retries >= self.max_retries {
            return RetryDecision::Fail(error);
        }
        let backoff = self.backoff.delay(state.retries);
        state.retries += 1;

        let delay = match cause {
            RetryCause::RateLimited => error.retry_after().unwrap_or(backoff),
            _ => backoff,
        };
        RetryDecision::Retry { delay, cause, error }
    }
}

/// Classify a non-2xx response.
#[must_use]
pub fn classify(outcome: &AttemptOutcome, path: &str) -> PimError {
    let status = outcome.status;
    let remote = RemoteErrorBody::parse(&outcome.body);
    let violations = remote.violations();
    let message = remote.message.clone().unwrap_or_else(|| fallback_message(outcome));

    match status {
        401 | 403 => PimError::Authentication { status: Some(status), message },
        400 | 422 => PimError::Validation {
            status: Some(status),
            field: violations.first().map(|v| v.property.clone()),
            message,
            violations,
        },
        404 => PimError::NotFound { path: path.to_string(), message },
        429 => PimError::RateLimited { retry_after: outcome.retry_after(), message },
        _ => PimError::Api { status, message },
    }
}

fn fallback_message(outcome: &AttemptOutcome) -> String {
    let text = outcome.text();
    let text = text.trim();
    if text.is_empty() {
        format!("request failed with status {}", outcome.status)
    } else {
        text.chars().take(512).collect()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(
            3,
            Backoff::new(Duration::from_millis(100), Duration::from_secs(1))
                .unwrap()
                .with_jitter(pimsdk_common::resilience::Jitter::None),
        )
    }

    fn response(status: u16, body: &str) -> Result<AttemptOutcome> {
        Ok(AttemptOutcome::new(status, vec![], Bytes::from(body.to_string())))
    }

    #[test]
    fn success_is_returned() {
        let mut state = RetryState::default();
        let decision =
            policy().evaluate(response(200, "{}"), &RequestDescriptor::get("/x"), &mut state);
        assert!(matches!(decision, RetryDecision::Succeed(_)));
    }

    #[test]
    fn server_errors_retry_with_backoff_until_budget_is_spent() {
        let policy = policy();
        let get = RequestDescriptor::get("/x");
        let mut state = RetryState::default();
        let mut delays = Vec::new();
        loop {
            match policy.evaluate(response(503, ""), &get, &mut state) {
                RetryDecision::Retry { delay, cause, .. } => {
                    assert_eq!(cause, RetryCause::Server);
                    delays.push(delay);
                }
                RetryDecision::Fail(err) => {
                    assert_eq!(err.status(), Some(503));
                    break;
                }
                RetryDecision::Succeed(_) => unreachable!(),
            }
        }
        assert_eq!(
            delays,
            vec![Duration::from_millis(100), Duration::from_millis(200), Duration::from_millis(400)]
        );
        assert_eq!(state.attempts(), 4);
    }

    #[test]
    fn writes_are_not_retried_on_server_errors_unless_opted_in() {
        let post = RequestDescriptor::post("/x");
        let mut state = RetryState::default();
        assert!(matches!(
            policy().evaluate(response(500, ""), &post, &mut state),
            RetryDecision::Fail(PimError::Api { status: 500, .. })
        ));

        let mut state = RetryState::default();
        assert!(matches!(
            policy().retry_writes(true).evaluate(response(500, ""), &post, &mut state),
            RetryDecision::Retry { .. }
        ));

        let mut state = RetryState::default();
        let opted_in = RequestDescriptor::patch("/x").retry_writes(true);
        assert!(matches!(
            policy().evaluate(response(502, ""), &opted_in, &mut state),
            RetryDecision::Retry { .. }
        ));
    }

    #[test]
    fn unsent_requests_are_always_retryable() {
        let mut state = RetryState::default();
        let decision = policy().evaluate(
            Err(PimError::connect("connection refused")),
            &RequestDescriptor::post("/x"),
            &mut state,
        );
        assert!(matches!(decision, RetryDecision::Retry { cause: RetryCause::Network, .. }));

        let mut state = RetryState::default();
        let sent = PimError::Network { message: "reset".into(), timed_out: true, request_sent: true };
        let decision = policy().evaluate(Err(sent), &RequestDescriptor::post("/x"), &mut state);
        assert!(matches!(decision, RetryDecision::Fail(PimError::Network { .. })));
    }

    #[test]
    fn rate_limit_honours_retry_after() {
        let mut state = RetryState::default();
        let outcome = AttemptOutcome::new(429, vec![("Retry-After".into(), "2".into())], Bytes::new());
        let decision = policy().evaluate(Ok(outcome), &RequestDescriptor::post("/x"), &mut state);
        match decision {
            RetryDecision::Retry { delay, cause, .. } => {
                assert_eq!(delay, Duration::from_secs(2));
                assert_eq!(cause, RetryCause::RateLimited);
            }
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[test]
    fn authentication_gets_one_refresh() {
        let policy = policy();
        let get = RequestDescriptor::get("/x");
        let mut state = RetryState::default();
        assert!(matches!(
            policy.evaluate(response(401, ""), &get, &mut state),
            RetryDecision::Retry { cause: RetryCause::CredentialRejected, delay: Duration::ZERO, .. }
        ));
        assert!(matches!(
            policy.evaluate(response(401, ""), &get, &mut state),
            RetryDecision::Fail(PimError::Authentication { status: Some(401), .. })
        ));
        assert_eq!(state.retries, 0);
    }

    #[test]
    fn caller_errors_fail_immediately() {
        let body = r#"{"code":422,"message":"Validation failed.","errors":[{"property":"family","message":"unknown"}]}"#;
        let mut state = RetryState::default();
        match policy().evaluate(response(422, body), &RequestDescriptor::get("/p"), &mut state) {
            RetryDecision::Fail(err) => {
                assert_eq!(err.field(), Some("family"));
                assert_eq!(err.to_string(), "Validation failed: Validation failed.");
            }
            other => panic!("unexpected decision {other:?}"),
        }

        let mut state = RetryState::default();
        match policy().evaluate(response(404, ""), &RequestDescriptor::get("/p/1"), &mut state) {
            RetryDecision::Fail(PimError::NotFound { path, message }) => {
                assert_eq!(path, "/p/1");
                assert_eq!(message, "request failed with status 404");
            }
            other => panic!("unexpected decision {other:?}"),
        }
    }
}
