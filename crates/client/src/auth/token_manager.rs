//! Token manager with single-flight refresh
//!
//! Holds the one [`Credential`] of a client and hands out clones of it.
//! The credential is refreshed:
//! - on first use
//! - once it is within `token_buffer` of its expiry
//! - after the API rejected it ([`TokenManager::invalidate`])
//!
//! Concurrent callers that find the credential stale queue on one refresh
//! lock. The first performs the exchange; the others wake up to its result,
//! success or failure, so one expiry event costs exactly one exchange.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use pimsdk_common::resilience::{saturating_millis, Backoff};
use pimsdk_domain::constants::MAX_RETRY_AFTER_SECS;
use pimsdk_domain::{Credential, PimError, Result, TokenResponse};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::exchange::{CredentialExchange, Grant};

#[derive(Debug, Default)]
struct Slot {
    credential: Option<Credential>,
    /// Set when the API rejected the held token
    rejected: bool,
}

#[derive(Debug, Default)]
struct RefreshState {
    /// Outcome of the latest refresh, shared with callers that waited on it
    last_error: Option<PimError>,
}

/// Owner of the client's bearer credential
pub struct TokenManager {
    exchange: Arc<dyn CredentialExchange>,
    primary_grant: Grant,
    slot: RwLock<Slot>,
    refresh: Mutex<RefreshState>,
    /// Bumped after every completed refresh attempt
    generation: AtomicU64,
    buffer: Duration,
    max_retries: u32,
    backoff: Backoff,
    exchanges: AtomicU64,
}

impl TokenManager {
    /// Create a token manager
    ///
    /// # Arguments
    /// * `exchange` - token endpoint client
    /// * `primary_grant` - grant used when no refresh token is available
    /// * `buffer` - refresh this long before expiry
    /// * `max_retries` - retries for transient exchange failures
    /// * `backoff` - delay schedule between those retries
    pub fn new(
        exchange: Arc<dyn CredentialExchange>,
        primary_grant: Grant,
        buffer: Duration,
        max_retries: u32,
        backoff: Backoff,
    ) -> Self {
        Self {
            exchange,
            primary_grant,
            slot: RwLock::new(Slot::default()),
            refresh: Mutex::new(RefreshState::default()),
            generation: AtomicU64::new(0),
            buffer,
            max_retries,
            backoff,
            exchanges: AtomicU64::new(0),
        }
    }

    /// Seed the manager with an existing credential.
    pub fn with_credential(self, credential: Credential) -> Self {
        self.slot.write().credential = Some(credential);
        self
    }

    /// Get a credential that is valid for at least `buffer`
    ///
    /// # Errors
    /// - `PimError::Authentication` when the token endpoint rejects the grant
    /// - `PimError::Network` / `PimError::Api` when the endpoint stayed
    ///   unreachable after `max_retries` retries
    pub async fn get_valid_credential(&self) -> Result<Credential> {
        if let Some(credential) = self.usable() {
            return Ok(credential);
        }

        // Callers arriving here together all see the same generation; the
        // first to take the lock refreshes, the rest find a newer one.
        let observed = self.generation.load(Ordering::Acquire);
        let mut state = self.refresh.lock().await;
        if self.generation.load(Ordering::Acquire) != observed {
            if let Some(credential) = self.usable() {
                return Ok(credential);
            }
            if let Some(err) = state.last_error.clone() {
                return Err(err);
            }
        }
        if let Some(credential) = self.usable() {
            return Ok(credential);
        }

        let previous = self.slot.read().credential.clone();
        let result = self.refresh_credential(previous.as_ref()).await;
        match result {
            Ok(credential) => {
                *self.slot.write() =
                    Slot { credential: Some(credential.clone()), rejected: false };
                state.last_error = None;
                self.generation.fetch_add(1, Ordering::Release);
                info!(
                    expires_in = credential.seconds_until_expiry(Utc::now()),
                    "access token refreshed"
                );
                Ok(credential)
            }
            Err(err) => {
                warn!(error = %err, "access token refresh failed");
                state.last_error = Some(err.clone());
                self.generation.fetch_add(1, Ordering::Release);
                Err(err)
            }
        }
    }

    /// Mark `access_token` as rejected by the API.
    ///
    /// Only takes effect while that token is still the held one, so a burst
    /// of 401s for the same token causes a single refresh.
    pub fn invalidate(&self, access_token: &str) {
        let mut slot = self.slot.write();
        let held = slot.credential.as_ref().is_some_and(|c| c.access_token == access_token);
        if held && !slot.rejected {
            debug!("access token rejected by the API, forcing refresh");
            slot.rejected = true;
        }
    }

    /// Current credential without triggering a refresh.
    #[must_use]
    pub fn current(&self) -> Option<Credential> {
        self.slot.read().credential.clone()
    }

    /// Number of exchanges performed (including retried attempts).
    #[must_use]
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    fn usable(&self) -> Option<Credential> {
        let slot = self.slot.read();
        slot.credential
            .as_ref()
            .filter(|c| !slot.rejected && !c.needs_refresh(Utc::now(), self.buffer))
            .cloned()
    }

    async fn refresh_credential(&self, previous: Option<&Credential>) -> Result<Credential> {
        if let Some(refresh_token) = previous.and_then(|c| c.refresh_token.clone()) {
            match self.exchange_with_retry(&Grant::RefreshToken(refresh_token)).await {
                Ok(response) => return Ok(Credential::issued(response, Utc::now())),
                Err(PimError::Authentication { message, .. }) => {
                    debug!(%message, "refresh token rejected, falling back to primary grant");
                }
                Err(err) => return Err(err),
            }
        }

        let response = self.exchange_with_retry(&self.primary_grant).await?;
        Ok(Credential::issued(response, Utc::now()))
    }

    async fn exchange_with_retry(&self, grant: &Grant) -> Result<TokenResponse> {
        let mut retries = 0;
        loop {
            self.exchanges.fetch_add(1, Ordering::Relaxed);
            match self.exchange.exchange(grant).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && retries < self.max_retries => {
                    let delay = err
                        .retry_after()
                        .unwrap_or_else(|| self.backoff.delay(retries))
                        .min(Duration::from_secs(MAX_RETRY_AFTER_SECS));
                    retries += 1;
                    warn!(
                        grant_type = grant.grant_type(),
                        retry = retries,
                        delay_ms = saturating_millis(delay),
                        error = %err,
                        "credential exchange failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
