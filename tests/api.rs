//! Read API behaviour against real files in a temp directory.

use std::path::Path;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use offer_finder::api::{ApiState, CACHE_CONTROL, build_app};

async fn get_offers(data_path: &Path, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let app = build_app(ApiState::new(data_path));
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
    let json: Value = serde_json::from_slice(&body).expect("json body");
    (status, headers, json)
}

#[tokio::test]
async fn full_shape_is_republished_with_cache_headers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offers.json");
    std::fs::write(
        &path,
        r#"{
          "ok": true,
          "updatedAt": "2024-05-01T10:00:00.000Z",
          "count": 1,
          "offers": [
            {"title": "A", "url": "https://x/a", "category": "Food", "image": "", "brand": "Acme"},
            {"title": "B", "url": "https://x/b", "category": "Food", "image": "", "brand": ""}
          ]
        }"#,
    )
    .unwrap();

    let (status, headers, json) = get_offers(&path, "/api/offers").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], CACHE_CONTROL);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json; charset=utf-8");
    assert_eq!(json["ok"], true);
    assert_eq!(json["updatedAt"], "2024-05-01T10:00:00.000Z");
    // derived from the offers, not the stale stored count
    assert_eq!(json["count"], 2);
    assert_eq!(json["offers"][0]["brand"], "Acme");
}

#[tokio::test]
async fn stub_shape_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offers.json");
    std::fs::write(
        &path,
        r#"{"updatedAt":"2024-05-01T10:00:00.000Z","offers":[{"title":"Up to ₹2400 Off","url":"https://www.timesprime.com/categories/Travel/flipkart-flight-offer","category":"Travel","image":"","brand":"Flipkart Flights"}]}"#,
    )
    .unwrap();

    let (status, _, json) = get_offers(&path, "/offers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["offers"][0]["category"], "Travel");
}

#[tokio::test]
async fn empty_payloads_yield_zero_offers() {
    let dir = tempfile::tempdir().unwrap();

    for contents in ["{}", "", "{\"updatedAt\": \"\", \"offers\": []}"] {
        let path = dir.path().join("offers.json");
        std::fs::write(&path, contents).unwrap();

        let (status, _, json) = get_offers(&path, "/api/offers").await;
        assert_eq!(status, StatusCode::OK, "contents: {contents:?}");
        assert_eq!(json["ok"], true);
        assert_eq!(json["count"], 0);
        assert_eq!(json["offers"], Value::Array(Vec::new()));
        assert_eq!(json["updatedAt"], Value::Null);
    }
}

#[tokio::test]
async fn null_offer_fields_are_served_as_empty_strings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offers.json");
    std::fs::write(
        &path,
        r#"{"offers":[{"title":"A","url":"https://x/a","image":null,"brand":null,"category":null}]}"#,
    )
    .unwrap();

    let (status, _, json) = get_offers(&path, "/api/offers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["offers"][0]["title"], "A");
    assert_eq!(json["offers"][0]["image"], "");
    assert_eq!(json["offers"][0]["brand"], "");
    assert_eq!(json["offers"][0]["category"], "");
}

#[tokio::test]
async fn missing_file_is_a_500_with_message() {
    let dir = tempfile::tempdir().unwrap();
    let (status, headers, json) = get_offers(&dir.path().join("absent.json"), "/api/offers").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(headers.get(header::CACHE_CONTROL).is_none());
    assert_eq!(json["ok"], false);
    assert!(json["error"].as_str().unwrap().contains("absent.json"));
}

#[tokio::test]
async fn malformed_file_is_a_500() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offers.json");
    std::fs::write(&path, "{\"offers\": \"nope\"}").unwrap();

    let (status, _, json) = get_offers(&path, "/api/offers").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["ok"], false);
    assert!(json["error"].is_string());
}
