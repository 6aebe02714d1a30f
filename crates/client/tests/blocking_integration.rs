//! Integration tests for the blocking adapter
//!
//! Plain `#[test]` functions: the adapter owns its runtime and must not be
//! driven from inside another one.

mod support;

use std::sync::Arc;

use pimsdk_client::{BlockingPimClient, BulkItem, BulkMode};
use pimsdk_domain::RequestDescriptor;
use serde_json::{json, Value};
use support::{client, json_outcome, MockTransport};

const FAMILIES: &str = "/api/rest/v1/families";

fn paged_transport() -> Arc<MockTransport> {
    MockTransport::new(|request| {
        let page = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "page")
            .map_or(1, |(_, v)| v.parse::<u32>().unwrap_or(1));
        let next = format!("https://pim.test{FAMILIES}?page={}&limit=2", page + 1);
        let mut links = json!({"self": {"href": "https://pim.test/self"}});
        if page < 2 {
            links["next"] = json!({"href": next});
        }
        let items = json!([{"code": format!("f{page}a")}, {"code": format!("f{page}b")}]);
        Ok(json_outcome(200, &json!({"_links": links, "current_page": page, "_embedded": {"items": items}})))
    })
}

#[test]
fn test_blocking_iteration_matches_async_pipeline() {
    let transport = paged_transport();
    let (async_client, exchange) = client(Arc::clone(&transport));
    let blocking = BlockingPimClient::from_client(async_client).unwrap();

    let codes: Vec<String> = blocking
        .iterate::<Value>(RequestDescriptor::get(FAMILIES).query("page", "1").query("limit", "2"))
        .map(|item| item.unwrap()["code"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(codes, ["f1a", "f1b", "f2a", "f2b"]);
    assert_eq!(transport.calls(), 2);
    assert_eq!(exchange.exchanges(), 1);
}

#[test]
fn test_blocking_calls_and_bulk() {
    let transport = MockTransport::fixed(200, json!({"code": "shoes"}));
    let (async_client, _) = client(Arc::clone(&transport));
    let blocking = BlockingPimClient::from_client(async_client).unwrap();

    let family: Value = blocking.get_json(&format!("{FAMILIES}/shoes")).unwrap();
    assert_eq!(family["code"], "shoes");

    let via_adapter: Value = blocking.call(|c| async move { c.families().get("shoes").await }).unwrap();
    assert_eq!(via_adapter, family);

    let items = vec![BulkItem::new("shoes", RequestDescriptor::patch(format!("{FAMILIES}/shoes")))];
    let results = blocking.execute_bulk(items, &BulkMode::PerItem);
    assert!(results[0].is_success());

    let first = blocking.first_page::<Value>(RequestDescriptor::get(FAMILIES));
    assert!(first.is_err(), "a single object is not a page envelope");
}
