//! Shared test doubles for the client integration tests
//!
//! - [`MockTransport`]: in-memory transport answering from a handler closure
//!   and recording every attempt with its (tokio) send time
//! - [`MockExchange`]: credential exchange issuing numbered tokens

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pimsdk_client::{
    CredentialExchange, Grant, PimClient, Transport, TransportRequest,
};
use pimsdk_domain::{AttemptOutcome, ClientConfig, PimError, RequestBody, Result, TokenResponse};
use serde_json::Value;
use tokio::time::Instant;

pub const BASE_URL: &str = "https://pim.test";

type Handler = dyn Fn(&TransportRequest) -> Result<AttemptOutcome> + Send + Sync;

/// One attempt seen by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct Recorded {
    pub request: TransportRequest,
    pub at: Instant,
}

impl Recorded {
    pub fn authorization(&self) -> Option<&str> {
        self.request
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.as_str())
    }

    pub fn path(&self) -> &str {
        self.request.url.path()
    }

    pub fn ndjson_lines(&self) -> Vec<Value> {
        match &self.request.body {
            RequestBody::Ndjson(lines) => lines.clone(),
            _ => Vec::new(),
        }
    }
}

pub struct MockTransport {
    handler: Box<Handler>,
    log: Mutex<Vec<Recorded>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&TransportRequest) -> Result<AttemptOutcome> + Send + Sync + 'static,
    {
        Arc::new(Self { handler: Box::new(handler), log: Mutex::new(Vec::new()) })
    }

    /// Transport answering every request with the same status and JSON body.
    pub fn fixed(status: u16, body: Value) -> Arc<Self> {
        Self::new(move |_| Ok(json_outcome(status, &body)))
    }

    pub fn calls(&self) -> usize {
        self.log.lock().len()
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<AttemptOutcome> {
        self.log.lock().push(Recorded { request: request.clone(), at: Instant::now() });
        (self.handler)(&request)
    }
}

/// Exchange issuing `token-1`, `token-2`, ... after an optional delay
pub struct MockExchange {
    issued: AtomicUsize,
    delay: Duration,
    expires_in: i64,
    grants: Mutex<Vec<Grant>>,
}

impl MockExchange {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            issued: AtomicUsize::new(0),
            delay,
            expires_in: 3600,
            grants: Mutex::new(Vec::new()),
        })
    }

    pub fn exchanges(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn grants(&self) -> Vec<Grant> {
        self.grants.lock().clone()
    }
}

#[async_trait]
impl CredentialExchange for MockExchange {
    async fn exchange(&self, grant: &Grant) -> Result<TokenResponse> {
        self.grants.lock().push(grant.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TokenResponse {
            access_token: format!("token-{n}"),
            expires_in: self.expires_in,
            token_type: Some("bearer".into()),
            refresh_token: None,
            scope: None,
        })
    }
}

pub fn json_outcome(status: u16, body: &Value) -> AttemptOutcome {
    AttemptOutcome::new(
        status,
        vec![("content-type".into(), "application/json".into())],
        body.to_string(),
    )
}

pub fn empty_outcome(status: u16) -> AttemptOutcome {
    AttemptOutcome::new(status, Vec::new(), Vec::<u8>::new())
}

pub fn unsent_error() -> PimError {
    PimError::connect("connection refused")
}

pub fn config() -> ClientConfig {
    let mut config = ClientConfig::new(BASE_URL, "client", "secret").with_user("admin", "pw");
    config.backoff_base_ms = 100;
    config.backoff_max_ms = 1_000;
    config
}

pub fn client_with(
    config: ClientConfig,
    transport: Arc<MockTransport>,
    exchange: Arc<MockExchange>,
) -> PimClient {
    PimClient::builder(config)
        .transport(transport)
        .credential_exchange(exchange)
        .build()
        .expect("client builds")
}

pub fn client(transport: Arc<MockTransport>) -> (PimClient, Arc<MockExchange>) {
    let exchange = MockExchange::new();
    (client_with(config(), transport, Arc::clone(&exchange)), exchange)
}
