//! HTTP Route Tests
//!
//! Drives the axum router directly with `tower::ServiceExt::oneshot`:
//! - `/health` reports relay counters
//! - CORS headers are granted only to configured origins
//! - `/ws` refuses plain (non-upgrade) requests

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use strokecast_relay::{HealthResponse, Relay, RelayConfig, router};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_reports_counters() {
    let relay = Arc::new(Relay::default());
    let (_a, _rx_a) = relay.join("room");
    let (_b, _rx_b) = relay.join("room");
    let (_c, _rx_c) = relay.join("other");

    let app = router(relay, Arc::new(RelayConfig::default()));
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        health,
        HealthResponse {
            status: "ok".to_string(),
            sessions: 2,
            participants: 3,
            strokes: 0,
        }
    );
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let app = router(Arc::new(Relay::default()), Arc::new(RelayConfig::default()));

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:3001")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3001"
    );

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_cors_any_origin() {
    let config = RelayConfig {
        allow_any_origin: true,
        ..RelayConfig::default()
    };
    let app = router(Arc::new(Relay::default()), Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://anywhere.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_some());
}

#[tokio::test]
async fn test_ws_requires_upgrade() {
    let relay = Arc::new(Relay::default());
    let app = router(relay.clone(), Arc::new(RelayConfig::default()));

    let response = app.oneshot(get("/ws?session=room")).await.unwrap();
    assert!(response.status().is_client_error());
    assert_eq!(relay.stats().participants, 0);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = router(Arc::new(Relay::default()), Arc::new(RelayConfig::default()));
    let response = app.oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
