//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with the service identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_service_identity() {
    let scratch = tempfile::tempdir().expect("create temp dir");
    let response = get(common::build_test_app(scratch.path()), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "jailrun");
    assert!(json["version"].is_string());
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404, wrong method returns 405
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let scratch = tempfile::tempdir().expect("create temp dir");
    let response = get(common::build_test_app(scratch.path()), "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_on_execute_returns_405() {
    let scratch = tempfile::tempdir().expect("create temp dir");
    let response = get(common::build_test_app(scratch.path()), "/execute").await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is generated, or propagated when supplied
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_generated_request_id() {
    let scratch = tempfile::tempdir().expect("create temp dir");
    let response = get(common::build_test_app(scratch.path()), "/health").await;

    let id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header")
        .to_str()
        .expect("ascii header");
    assert!(uuid::Uuid::parse_str(id).is_ok(), "not a UUID: {id}");
}

#[tokio::test]
async fn supplied_request_id_is_propagated() {
    let scratch = tempfile::tempdir().expect("create temp dir");
    let response = common::build_test_app(scratch.path())
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/health")
                .header("x-request-id", "trace-me-123")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("send request");

    assert_eq!(
        response.headers().get("x-request-id").map(|v| v.as_bytes()),
        Some(&b"trace-me-123"[..])
    );
}

// ---------------------------------------------------------------------------
// Test: CORS preflight from the configured origin is allowed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let scratch = tempfile::tempdir().expect("create temp dir");
    let response = common::build_test_app(scratch.path())
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/execute")
                .header("origin", "http://localhost:5173")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("send request");

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .map(|v| v.as_bytes()),
        Some(&b"http://localhost:5173"[..])
    );
}
