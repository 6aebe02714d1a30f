//! Integration tests for the request pipeline
//!
//! Rate limiting, retries and credential handling, exercised through
//! `PimClient` over an in-memory transport with paused tokio time.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use pimsdk_client::PimClient;
use pimsdk_domain::constants::MAX_RETRY_AFTER_SECS;
use pimsdk_domain::{AttemptOutcome, Credential, PimError, RequestDescriptor};
use serde_json::json;
use support::{
    client, client_with, config, empty_outcome, json_outcome, unsent_error, MockExchange,
    MockTransport,
};
use tokio::time::Instant;

const FAMILIES: &str = "/api/rest/v1/families";

/// Validates the rolling-window quota under heavy concurrency.
///
/// # Test Steps
/// 1. Fire 105 concurrent GETs at a client limited to 20 calls per 60s
/// 2. Verify no 60s window contains more than 20 transport attempts
/// 3. Verify the batch needed at least five full windows of virtual time
#[tokio::test(start_paused = true)]
async fn test_quota_holds_for_concurrent_callers() {
    let transport = MockTransport::fixed(200, json!({"code": "shoes"}));
    let (client, _) = client(Arc::clone(&transport));
    let started = Instant::now();

    let calls = (0..105).map(|_| {
        let client = client.clone();
        async move { client.execute(&RequestDescriptor::get(FAMILIES)).await }
    });
    let results = join_all(calls).await;
    assert!(results.iter().all(Result::is_ok));

    let mut sent: Vec<Instant> = transport.recorded().into_iter().map(|r| r.at).collect();
    sent.sort();
    assert_eq!(sent.len(), 105);
    for window in sent.windows(21) {
        assert!(
            window[20].duration_since(window[0]) >= Duration::from_secs(60),
            "21 attempts within one period"
        );
    }
    assert!(started.elapsed() >= Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn test_quota_is_shared_between_clones() {
    let transport = MockTransport::fixed(200, json!({}));
    let (client, _) = client(Arc::clone(&transport));
    let other = client.clone();

    for _ in 0..20 {
        client.execute(&RequestDescriptor::get(FAMILIES)).await.unwrap();
    }
    assert_eq!(other.rate_limiter().available(), 0);

    let started = Instant::now();
    other.execute(&RequestDescriptor::get(FAMILIES)).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(59));
}

/// Validates single-flight token refresh.
///
/// # Test Steps
/// 1. Start 16 calls at once on a client without a credential
/// 2. Make the exchange slow so every caller observes the refresh in flight
/// 3. Verify exactly one exchange ran and every attempt carried its token
#[tokio::test(start_paused = true)]
async fn test_racing_callers_share_one_exchange() {
    let transport = MockTransport::fixed(200, json!({}));
    let exchange = MockExchange::with_delay(Duration::from_millis(250));
    let client = client_with(config(), Arc::clone(&transport), Arc::clone(&exchange));

    let calls = (0..16).map(|_| {
        let client = client.clone();
        async move { client.execute(&RequestDescriptor::get(FAMILIES)).await }
    });
    let results = join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(exchange.exchanges(), 1);
    assert!(transport.recorded().iter().all(|r| r.authorization() == Some("Bearer token-1")));
}

#[tokio::test(start_paused = true)]
async fn test_token_refreshed_before_expiry_buffer() {
    let transport = MockTransport::fixed(200, json!({}));
    let exchange = MockExchange::new();
    let stale = Credential {
        access_token: "about-to-expire".into(),
        token_type: "Bearer".into(),
        expires_at: Utc::now() + chrono::Duration::seconds(30),
        refresh_token: None,
    };
    let client = PimClient::builder(config())
        .transport(Arc::clone(&transport) as _)
        .credential_exchange(Arc::clone(&exchange) as _)
        .credential(stale)
        .build()
        .unwrap();

    client.execute(&RequestDescriptor::get(FAMILIES)).await.unwrap();

    assert_eq!(exchange.exchanges(), 1);
    assert_eq!(transport.recorded()[0].authorization(), Some("Bearer token-1"));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_token_is_refreshed_once() {
    let transport = MockTransport::new(|request| {
        let rejected = request.headers.iter().any(|(_, v)| v == "Bearer token-1");
        Ok(if rejected { json_outcome(401, &json!({"message": "expired"})) } else { empty_outcome(204) })
    });
    let (client, exchange) = client(Arc::clone(&transport));

    let outcome = client.execute(&RequestDescriptor::delete(format!("{FAMILIES}/shoes"))).await.unwrap();

    assert_eq!(outcome.status, 204);
    assert_eq!(exchange.exchanges(), 2);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_rejection_surfaces_authentication_error() {
    let transport = MockTransport::fixed(401, json!({"code": 401, "message": "Invalid token"}));
    let (client, exchange) = client(Arc::clone(&transport));

    let err = client.execute(&RequestDescriptor::get(FAMILIES)).await.unwrap_err();

    assert!(matches!(err, PimError::Authentication { status: Some(401), .. }));
    assert_eq!(transport.calls(), 2);
    assert_eq!(exchange.exchanges(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_server_errors_use_full_retry_budget() {
    let transport = MockTransport::fixed(503, json!({"message": "maintenance"}));
    let mut config = config();
    config.max_retries = 3;
    let client = client_with(config, Arc::clone(&transport), MockExchange::new());

    let err = client.execute(&RequestDescriptor::get(FAMILIES)).await.unwrap_err();

    assert_eq!(err, PimError::Api { status: 503, message: "maintenance".into() });
    assert_eq!(transport.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_response_waits_for_retry_after() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let transport = MockTransport::new(move |_| {
        Ok(if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            AttemptOutcome::new(429, vec![("Retry-After".into(), "2".into())], "")
        } else {
            json_outcome(200, &json!({"code": "shoes"}))
        })
    });
    let (client, _) = client(Arc::clone(&transport));
    let started = Instant::now();

    let family: serde_json::Value = client.get_json(&format!("{FAMILIES}/shoes")).await.unwrap();

    assert_eq!(family["code"], "shoes");
    assert_eq!(transport.calls(), 2);
    let recorded = transport.recorded();
    assert!(recorded[1].at.duration_since(recorded[0].at) >= Duration::from_secs(2));
    assert!(started.elapsed() >= Duration::from_secs(2));
}

/// A server-sent pause beyond any sane bound is clamped, not trusted.
///
/// # Test Steps
/// 1. Answer the first attempt with 429 and an enormous `Retry-After`
/// 2. Answer the retry with 200
/// 3. Verify the call succeeds after exactly the clamped pause
#[tokio::test(start_paused = true)]
async fn test_oversized_retry_after_is_clamped() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let transport = MockTransport::new(move |_| {
        Ok(if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            AttemptOutcome::new(
                429,
                vec![("Retry-After".into(), "10000000000000000000".into())],
                "",
            )
        } else {
            json_outcome(200, &json!({"code": "shoes"}))
        })
    });
    let (client, _) = client(Arc::clone(&transport));

    let family: serde_json::Value = client.get_json(&format!("{FAMILIES}/shoes")).await.unwrap();

    assert_eq!(family["code"], "shoes");
    assert_eq!(transport.calls(), 2);
    let recorded = transport.recorded();
    let paused = recorded[1].at.duration_since(recorded[0].at);
    assert!(paused >= Duration::from_secs(MAX_RETRY_AFTER_SECS));
    assert!(paused < Duration::from_secs(MAX_RETRY_AFTER_SECS + 1));
}

#[tokio::test(start_paused = true)]
async fn test_writes_are_not_resent_after_server_error() {
    let transport = MockTransport::fixed(500, json!({"message": "boom"}));
    let (client, _) = client(Arc::clone(&transport));

    let request = RequestDescriptor::post(FAMILIES).json(json!({"code": "shoes"}));
    let err = client.execute(&request).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(transport.calls(), 1);

    let opted_in = request.retry_writes(true);
    assert!(client.execute(&opted_in).await.is_err());
    assert_eq!(transport.calls(), 1 + 4);
}

#[tokio::test(start_paused = true)]
async fn test_unsent_write_is_retried() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let transport = MockTransport::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(unsent_error())
        } else {
            Ok(AttemptOutcome::new(201, vec![("Location".into(), "/api/rest/v1/families/shoes".into())], ""))
        }
    });
    let (client, _) = client(Arc::clone(&transport));

    let ack = client.families().create(json!({"code": "shoes"})).await.unwrap();

    assert!(ack.created());
    assert_eq!(ack.location.as_deref(), Some("/api/rest/v1/families/shoes"));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_caller_errors_fail_fast() {
    let transport = MockTransport::new(|request| {
        Ok(if request.url.path().ends_with("/missing") {
            json_outcome(404, &json!({"code": 404, "message": "Resource not found"}))
        } else {
            json_outcome(
                422,
                &json!({
                    "code": 422,
                    "message": "Validation failed.",
                    "errors": [{"property": "attributes", "message": "unknown attribute"}]
                }),
            )
        })
    });
    let (client, _) = client(Arc::clone(&transport));

    let err = client.families().get::<serde_json::Value>("missing").await.unwrap_err();
    assert!(matches!(err, PimError::NotFound { .. }));

    let err = client.families().update("shoes", json!({"attributes": ["nope"]})).await.unwrap_err();
    assert_eq!(err.field(), Some("attributes"));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_the_whole_call() {
    let transport = MockTransport::fixed(502, json!({}));
    let mut config = config();
    config.max_retries = 50;
    let client = client_with(config, Arc::clone(&transport), MockExchange::new());

    let request = RequestDescriptor::get(FAMILIES).deadline(Duration::from_secs(2));
    let err = client.execute(&request).await.unwrap_err();

    assert!(matches!(err, PimError::Timeout { elapsed } if elapsed >= Duration::from_secs(2)));
    assert!(transport.calls() < 51);
}
