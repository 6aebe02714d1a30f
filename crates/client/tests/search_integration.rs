//! Integration tests for compiled searches reaching the wire

mod support;

use std::sync::Arc;

use pimsdk_client::search::{AttributeRef, Operator, SearchQuery};
use pimsdk_domain::{HttpMethod, PimError, RequestBody};
use serde_json::{json, Value};
use support::{client, json_outcome, MockTransport};

fn empty_page() -> Value {
    json!({"_links": {"self": {"href": "https://pim.test/x"}}, "_embedded": {"items": []}})
}

fn catalog_query() -> SearchQuery {
    SearchQuery::new()
        .enabled(Operator::Equal, true)
        .completeness(Operator::GreaterOrEqual, 90, "ecommerce")
        .attribute_number(AttributeRef::new("price").scope("ecommerce"), Operator::Greater, 10)
        .attribute_number(AttributeRef::new("price").scope("ecommerce"), Operator::Lower, 100)
        .search_locale("en_US")
        .limit(25)
}

#[test]
fn test_compilation_is_deterministic() {
    let a = catalog_query().compile().unwrap();
    let b = catalog_query().compile().unwrap();
    assert_eq!(a, b);
    assert_eq!(
        a.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
        ["search", "search_locale", "limit"]
    );

    let search: Value = serde_json::from_str(&a[0].1).unwrap();
    assert_eq!(search["price"].as_array().unwrap().len(), 2);
    assert_eq!(search["completeness"][0]["scope"], "ecommerce");
}

#[tokio::test(start_paused = true)]
async fn test_list_sends_search_as_query_parameter() {
    let transport = MockTransport::fixed(200, empty_page());
    let (client, _) = client(Arc::clone(&transport));
    let query = catalog_query();

    let page = client.products().list::<Value>(&query).await.unwrap();
    assert!(page.items.is_empty());

    let recorded = transport.recorded();
    let url = &recorded[0].request.url;
    assert_eq!(url.path(), "/api/rest/v1/products-uuid");
    let sent: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(sent, query.compile().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_post_search_sends_body_and_may_retry() {
    let transport = MockTransport::new(|_| Ok(json_outcome(200, &empty_page())));
    let (client, _) = client(Arc::clone(&transport));

    client.products().search::<Value>(&catalog_query()).await.unwrap();

    let recorded = transport.recorded();
    assert_eq!(recorded[0].request.method, HttpMethod::Post);
    assert_eq!(recorded[0].path(), "/api/rest/v1/products-uuid/search");
    let RequestBody::Json(body) = &recorded[0].request.body else {
        panic!("expected a JSON body");
    };
    assert!(body["search"].is_string());
    assert_eq!(body["limit"], 25);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_query_never_reaches_transport() {
    let transport = MockTransport::fixed(200, empty_page());
    let (client, _) = client(Arc::clone(&transport));

    let query = SearchQuery::new().raw("family", "NEARLY", Some(json!(["x"])));
    let err = client.products().list::<Value>(&query).await.unwrap_err();
    assert!(matches!(err, PimError::Validation { .. }));

    let query = SearchQuery::new().enabled(Operator::In, true);
    assert_eq!(client.families().list::<Value>(&query).await.unwrap_err().field(), Some("enabled"));
    assert_eq!(transport.calls(), 0);
}

/// Validates that following a `next` link from a POST search lets the link
/// carry the page position.
///
/// # Test Steps
/// 1. POST a search with `page` and `limit` set in the body
/// 2. Answer the first request with a `next` link naming page 2
/// 3. Verify the second request re-posts the criteria without `page` or `limit`
#[tokio::test(start_paused = true)]
async fn test_post_search_follows_next_link_without_stale_paging() {
    let transport = MockTransport::new(|request| {
        let next = "https://pim.test/api/rest/v1/products-uuid/search?page=2&limit=25";
        Ok(if request.url.query().is_none() {
            json_outcome(
                200,
                &json!({
                    "_links": {"self": {"href": "https://pim.test/x"}, "next": {"href": next}},
                    "_embedded": {"items": [{"uuid": "a"}]}
                }),
            )
        } else {
            json_outcome(200, &empty_page())
        })
    });
    let (client, _) = client(Arc::clone(&transport));
    let query = catalog_query()
        .page(1)
        .attribute_text("color_name", Operator::In, vec!["red", "blue"]);

    let first = client.products().search::<Value>(&query).await.unwrap();
    let second = client.next_page(&first).await.unwrap().unwrap();
    assert!(second.items.is_empty());

    let recorded = transport.recorded();
    assert_eq!(recorded.len(), 2);
    let RequestBody::Json(first_body) = &recorded[0].request.body else {
        panic!("expected a JSON body");
    };
    assert_eq!(first_body["page"], 1);
    assert_eq!(first_body["limit"], 25);

    assert_eq!(recorded[1].request.method, HttpMethod::Post);
    assert_eq!(recorded[1].request.url.query(), Some("page=2&limit=25"));
    let RequestBody::Json(next_body) = &recorded[1].request.body else {
        panic!("expected a JSON body");
    };
    assert!(next_body.get("page").is_none());
    assert!(next_body.get("limit").is_none());
    assert_eq!(next_body["search"], first_body["search"]);
    assert_eq!(next_body["search_locale"], "en_US");
}
