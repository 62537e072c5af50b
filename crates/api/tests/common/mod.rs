#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use jailrun_core::scripting::config::{SandboxConfig, SandboxMode};
use tower::ServiceExt;

use jailrun_api::config::{LogFormat, ServerConfig};
use jailrun_api::router::build_app_router;
use jailrun_api::state::AppState;

/// Build a test `ServerConfig` that runs scripts directly with `python3`
/// under `scratch_root`, with a 3 second script budget.
pub fn test_config(scratch_root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_body_bytes: 64 * 1024,
        log_format: LogFormat::Text,
        sandbox: SandboxConfig {
            mode: SandboxMode::Direct,
            python_bin: "python3".into(),
            timeout: Duration::from_secs(3),
            scratch_root: scratch_root.to_path_buf(),
            ..SandboxConfig::default()
        },
    }
}

/// Build the full application router, with the same middleware stack as
/// production.
pub fn build_test_app(scratch_root: &Path) -> Router {
    let config = test_config(scratch_root);
    build_app_router(AppState::new(config.clone()), &config)
}

/// Whether `python3` can be run. Tests that execute scripts return early
/// when it cannot.
pub fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("build request"),
    )
    .await
    .expect("send request")
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.into())
            .expect("build request"),
    )
    .await
    .expect("send request")
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

/// Submit `script` to `/execute`.
pub async fn execute(app: Router, script: &str) -> Response<Body> {
    post_json(app, "/execute", serde_json::json!({ "script": script })).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}
