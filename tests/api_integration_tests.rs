//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use shm_cache::{api::create_router, AppState, CacheStore, StoreOptions};
use tower::ServiceExt;

// == Helper Functions ==

/// Every test attaches its own image so parallel tests never share entries.
fn test_options() -> StoreOptions {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let id = NEXT.fetch_add(1, Ordering::Relaxed);
    StoreOptions::new()
        .with_directory(std::env::temp_dir().join("shm_cache-integration"))
        .with_name(format!("api-{}-{}", std::process::id(), id))
}

fn create_test_app() -> Router {
    create_router(AppState::new(CacheStore::open(test_options())))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/set")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"key":"test_key","value":"test_value"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
    assert_eq!(json["stored"], true);
}

#[tokio::test]
async fn test_set_endpoint_with_ttl() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        "PUT",
        "/set",
        Some(json!({ "key": "ttl_key", "value": "ttl_value", "ttl": 60 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stored"], true);
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_returns_structured_value() {
    let app = create_test_app();
    let value = json!({ "name": "widget", "tags": ["a", "b"], "count": 3 });

    let (status, _) = send(
        &app,
        "PUT",
        "/set",
        Some(json!({ "key": "get_key", "value": value })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "GET", "/get/get_key", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "get_key");
    assert_eq!(json["value"], value);
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/get/nonexistent_key", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json.get("error").is_some());
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint() {
    let app = create_test_app();

    send(
        &app,
        "PUT",
        "/set",
        Some(json!({ "key": "delete_key", "value": "delete_value" })),
    )
    .await;

    let (status, _) = send(&app, "DELETE", "/del/delete_key", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/get/delete_key", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/del/delete_key", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == Counter Endpoint Tests ==

#[tokio::test]
async fn test_counter_endpoints() {
    let app = create_test_app();

    send(&app, "PUT", "/set", Some(json!({ "key": "hits", "value": 10 }))).await;

    let (status, json) = send(&app, "POST", "/incr/hits", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], 11);

    let (status, json) = send(&app, "POST", "/incr/hits", Some(json!({ "amount": 9 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], 20);

    let (status, json) = send(&app, "POST", "/decr/hits", Some(json!({ "amount": 25 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], -5);

    let (_, json) = send(&app, "GET", "/get/hits", None).await;
    assert_eq!(json["value"], -5);
}

#[tokio::test]
async fn test_counter_on_missing_key_is_not_created() {
    let app = create_test_app();

    let (status, _) = send(&app, "POST", "/incr/absent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/get/absent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_counter_on_non_integer_is_rejected() {
    let app = create_test_app();

    send(&app, "PUT", "/set", Some(json!({ "key": "name", "value": "alice" }))).await;

    let (status, json) = send(&app, "POST", "/incr/name", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json.get("error").is_some());
}

// == Bulk Endpoint Tests ==

#[tokio::test]
async fn test_delete_matched_endpoint() {
    let app = create_test_app();

    for key in ["user:1", "user:2", "session:1"] {
        send(&app, "PUT", "/set", Some(json!({ "key": key, "value": 1 }))).await;
    }

    let (status, json) = send(
        &app,
        "POST",
        "/delete_matched",
        Some(json!({ "pattern": "user:*" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 2);

    let (status, _) = send(&app, "GET", "/get/session:1", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_prune_endpoint_reaches_target() {
    let app = create_test_app();

    for i in 0..20 {
        send(
            &app,
            "PUT",
            "/set",
            Some(json!({ "key": format!("k{}", i), "value": "x".repeat(1024) })),
        )
        .await;
    }

    let (status, json) = send(&app, "POST", "/prune", Some(json!({ "target_size": 0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["skipped"], false);
    assert_eq!(json["evicted"], 20);
    assert_eq!(json["used_bytes"], 0);

    let (_, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(json["entries"], 0);
    assert_eq!(json["evictions"], 20);
}

#[tokio::test]
async fn test_clear_endpoint() {
    let app = create_test_app();

    send(&app, "PUT", "/set", Some(json!({ "key": "a", "value": 1 }))).await;

    let (status, _) = send(&app, "POST", "/clear", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(json["entries"], 0);
}

// == Capacity Tests ==

#[tokio::test]
async fn test_sustained_writes_prune_instead_of_failing() {
    let app = create_test_app();
    let blob = "x".repeat(512 * 1024);

    // 24 MiB of payload into a 16 MiB image
    for i in 0..48 {
        let (status, json) = send(
            &app,
            "PUT",
            "/set",
            Some(json!({ "key": format!("blob{}", i), "value": blob })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["stored"], true, "write {} was rejected", i);
    }

    let (_, json) = send(&app, "GET", "/stats", None).await;
    assert!(json["prunes"].as_u64().unwrap() >= 1);
    assert!(json["evictions"].as_u64().unwrap() >= 1);
    assert!(json["used_bytes"].as_u64().unwrap() <= json["total_bytes"].as_u64().unwrap());

    // The most recent write always survives
    let (status, _) = send(&app, "GET", "/get/blob47", None).await;
    assert_eq!(status, StatusCode::OK);
}

// == STATS / INSPECT Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    send(
        &app,
        "PUT",
        "/set",
        Some(json!({ "key": "stats_key", "value": "stats_value" })),
    )
    .await;
    send(&app, "GET", "/get/stats_key", None).await;
    send(&app, "GET", "/get/nonexistent", None).await;

    let (status, json) = send(&app, "GET", "/stats", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["writes"], 1);
    assert_eq!(json["entries"], 1);
    assert_eq!(json["total_bytes"], 16 * 1024 * 1024);
    assert!((json["hit_rate"].as_f64().unwrap() - 0.5).abs() < 0.001);
}

#[tokio::test]
async fn test_inspect_endpoint() {
    let app = create_test_app();

    send(&app, "PUT", "/set", Some(json!({ "key": "a", "value": 1 }))).await;

    let (status, json) = send(&app, "GET", "/inspect", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["entries"], 1);
    assert!(json["options"].is_object());
    assert!(json["summary"]
        .as_str()
        .unwrap()
        .starts_with("#<CacheStore entries=1"));
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/set")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"invalid json"#))
                .unwrap(),
        )
        .await
        .unwrap();

    // Axum returns 400 or 422 for JSON parsing errors
    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_empty_key_request() {
    let app = create_test_app();

    let (status, json) = send(&app, "PUT", "/set", Some(json!({ "key": "", "value": "test" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}

// == TTL Expiration via API Tests ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        "PUT",
        "/set",
        Some(json!({ "key": "ttl_test", "value": "expires_soon", "ttl": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/get/ttl_test", None).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let (status, _) = send(&app, "GET", "/get/ttl_test", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(json["expirations"], 1);
    assert_eq!(json["entries"], 0);
}

// == Shared Image Tests ==

#[tokio::test]
async fn test_stores_on_one_path_share_entries() {
    let options = test_options();
    let first = create_router(AppState::new(CacheStore::open(options.clone())));
    let second = create_router(AppState::new(CacheStore::open(options)));

    send(&first, "PUT", "/set", Some(json!({ "key": "shared", "value": "v" }))).await;

    let (status, json) = send(&second, "GET", "/get/shared", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], "v");
}
