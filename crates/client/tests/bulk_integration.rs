//! Integration tests for bulk execution in both modes

mod support;

use std::sync::Arc;

use pimsdk_client::{BulkItem, BulkMode, ProductKey};
use pimsdk_domain::{AttemptOutcome, HttpMethod, RequestBody, RequestDescriptor};
use serde_json::{json, Value};
use support::{client, empty_outcome, json_outcome, MockTransport};

const FAMILIES: &str = "/api/rest/v1/families";

fn family_items(codes: &[&str]) -> Vec<BulkItem> {
    codes
        .iter()
        .map(|code| {
            BulkItem::new(
                *code,
                RequestDescriptor::patch(format!("{FAMILIES}/{code}")).json(json!({"code": code})),
            )
        })
        .collect()
}

/// Answers each NDJSON line with 204, or 422 for codes starting with `bad`.
fn ndjson_status_transport() -> Arc<MockTransport> {
    MockTransport::new(|request| {
        let RequestBody::Ndjson(lines) = &request.body else {
            return Ok(empty_outcome(400));
        };
        let body: Vec<String> = lines
            .iter()
            .enumerate()
            .map(|(index, line)| {
                let code = line["code"].as_str().unwrap_or_default();
                let status = if code.starts_with("bad") {
                    json!({"line": index + 1, "code": code, "status_code": 422, "message": "invalid family"})
                } else {
                    json!({"line": index + 1, "code": code, "status_code": 204})
                };
                status.to_string()
            })
            .collect();
        Ok(AttemptOutcome::new(200, Vec::new(), body.join("\n")))
    })
}

#[tokio::test(start_paused = true)]
async fn test_per_item_sizes_zero_one_many() {
    let transport = MockTransport::new(|request| {
        Ok(if request.url.path().ends_with("/bad") {
            json_outcome(422, &json!({"code": 422, "message": "invalid family"}))
        } else {
            empty_outcome(204)
        })
    });
    let (client, _) = client(Arc::clone(&transport));

    assert!(client.execute_bulk(Vec::new(), &BulkMode::PerItem).await.is_empty());
    assert_eq!(transport.calls(), 0);

    let one = client.execute_bulk(family_items(&["shoes"]), &BulkMode::PerItem).await;
    assert_eq!(one.len(), 1);
    assert!(one[0].is_success());

    let codes = ["a", "b", "bad", "c", "d", "e", "f"];
    let many = client.execute_bulk(family_items(&codes), &BulkMode::PerItem).await;
    assert_eq!(many.iter().map(|r| r.identifier.as_str()).collect::<Vec<_>>(), codes);
    assert_eq!(many.iter().filter(|r| !r.is_success()).count(), 1);
    assert_eq!(many[2].status_code, 422);
    assert!(many[2].message.as_deref().unwrap_or_default().contains("invalid family"));
    assert_eq!(transport.calls(), 1 + codes.len());
}

/// Validates native NDJSON bulk with chunking and per-line statuses.
///
/// # Test Steps
/// 1. Upsert five families with a batch size of two
/// 2. Have the server reject one line with 422
/// 3. Verify three PATCH requests, results in input order, one failure
#[tokio::test(start_paused = true)]
async fn test_native_mode_chunks_and_maps_lines() {
    let transport = ndjson_status_transport();
    let mut config = support::config();
    config.bulk_batch_size = 2;
    let client = support::client_with(config, Arc::clone(&transport), support::MockExchange::new());

    let payloads = ["shoes", "hats", "bad-socks", "belts", "scarves"]
        .iter()
        .map(|code| json!({"code": code, "attributes": ["sku"]}))
        .collect();
    let results = client.families().bulk_upsert(payloads).await.unwrap();

    assert_eq!(results.len(), 5);
    assert_eq!(results[2].identifier, "bad-socks");
    assert_eq!(results[2].status_code, 422);
    assert!(results.iter().enumerate().all(|(i, r)| i == 2 || r.status_code == 204));

    let recorded = transport.recorded();
    assert_eq!(recorded.len(), 3);
    assert!(recorded.iter().all(|r| r.request.method == HttpMethod::Patch && r.path() == FAMILIES));
    assert_eq!(recorded.iter().map(|r| r.ndjson_lines().len()).sum::<usize>(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_native_mode_zero_and_one_item() {
    let transport = ndjson_status_transport();
    let (client, _) = client(Arc::clone(&transport));
    let mode = BulkMode::native(FAMILIES);

    assert!(client.execute_bulk(Vec::new(), &mode).await.is_empty());
    assert_eq!(transport.calls(), 0);

    let one = client.execute_bulk(family_items(&["shoes"]), &mode).await;
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].status_code, 204);
}

#[tokio::test(start_paused = true)]
async fn test_native_mode_missing_lines_and_failed_chunks() {
    // First chunk loses its second status line; the second chunk fails outright.
    let transport = MockTransport::new(|request| {
        let RequestBody::Ndjson(lines) = &request.body else {
            return Ok(empty_outcome(400));
        };
        if lines[0]["code"] == "boom" {
            return Ok(json_outcome(500, &json!({"message": "bulk import failed"})));
        }
        let first = json!({"line": 1, "code": lines[0]["code"], "status_code": 201});
        Ok(AttemptOutcome::new(200, Vec::new(), first.to_string()))
    });
    let mut config = support::config();
    config.bulk_batch_size = 2;
    let client = support::client_with(config, Arc::clone(&transport), support::MockExchange::new());

    let mut items = family_items(&["shoes", "hats", "boom", "belts"]);
    items.push(BulkItem::new("no-body", RequestDescriptor::delete(format!("{FAMILIES}/x"))));
    let results = client.execute_bulk(items, &BulkMode::native(FAMILIES)).await;

    let statuses: Vec<u16> = results.iter().map(|r| r.status_code).collect();
    assert_eq!(statuses, [201, 0, 500, 500, 0]);
    assert!(results[1].message.as_deref().unwrap_or_default().contains("no per-item status"));
    assert!(results[4].message.as_deref().unwrap_or_default().contains("JSON body"));
    // PATCH chunks are not resent after a server error
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_product_upsert_keys_lines_by_identifier() {
    let transport = MockTransport::new(|request| {
        let RequestBody::Ndjson(lines) = &request.body else {
            return Ok(empty_outcome(400));
        };
        let body: Vec<String> = lines
            .iter()
            .map(|line| json!({"line": 0, "identifier": line["identifier"], "status_code": 201}).to_string())
            .collect();
        Ok(AttemptOutcome::new(200, Vec::new(), body.join("\n")))
    });
    let (client, _) = client(Arc::clone(&transport));

    let payloads = vec![json!({"identifier": "sku-1", "enabled": true}), json!({"identifier": "sku-2"})];
    let results = client.products().bulk_upsert(payloads, ProductKey::Identifier).await.unwrap();

    assert!(results.iter().all(|r| r.status_code == 201));
    let recorded = transport.recorded();
    assert_eq!(recorded[0].path(), "/api/rest/v1/products");
    let lines: Vec<Value> = recorded[0].ndjson_lines();
    assert_eq!(lines[0]["identifier"], "sku-1");

    let err = client.products().bulk_upsert(vec![json!({"enabled": false})], ProductKey::Uuid).await.unwrap_err();
    assert_eq!(err.field(), Some("uuid"));
}
