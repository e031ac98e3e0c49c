//! Health, readiness and metrics endpoint tests.

mod common;

use common::TestApp;
use ordering_service::services::{DisabledNotifier, InMemoryStore};
use std::sync::Arc;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ordering-service");
}

#[tokio::test]
async fn readiness_fails_when_store_is_down() {
    let store = Arc::new(InMemoryStore::new());
    let app = TestApp::spawn_with_store(store.clone(), Arc::new(DisabledNotifier)).await;

    let response = app.client.get(app.url("/ready")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    store.set_unavailable(true).await;

    let response = app.client.get(app.url("/ready")).send().await.unwrap();
    assert_eq!(response.status(), 503);

    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn metrics_endpoint_works() {
    let app = TestApp::spawn().await;

    // Generate at least one quote so the coupon counters have a sample
    app.quote(uuid::Uuid::new_v4(), "NOPE", 100.0).await;

    let response = app
        .client
        .get(app.url("/metrics"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap_or("").contains("text/plain"))
        .unwrap_or(false));

    let body = response.text().await.unwrap();
    assert!(body.contains("ordering_coupon_quotes_total"));
}
