//! tests/common/mod.rs
//! Shared test helpers: spawn the agent on an ephemeral port and build payloads.

#![allow(dead_code)]

use std::path::PathBuf;

use apm_test_agent::config::{environment::EnvironmentVariables, state::AppState};
use apm_test_agent::create_app;

use axum::{serve, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener as TokioTcpListener;

/// Spawns the agent with default configuration and returns its base URL.
pub fn spawn_app() -> String {
    spawn_app_with(EnvironmentVariables::default())
}

/// Spawns the agent with the given configuration and returns its base URL.
pub fn spawn_app_with(env: EnvironmentVariables) -> String {
    let state: AppState = AppState::new(env).expect("Failed to build AppState");
    let app: Router = create_app(state);

    // * Bind an ephemeral port using std::net::TcpListener.
    let std_listener: std::net::TcpListener = std::net::TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    std_listener.set_nonblocking(true).unwrap();

    // * Convert std::net::TcpListener to tokio::net::TcpListener.
    let tokio_listener: TokioTcpListener = TokioTcpListener::from_std(std_listener)
        .expect("Failed to convert to tokio listener");

    let addr: std::net::SocketAddr = tokio_listener.local_addr().unwrap();

    // * Spawn the server in a background task.
    tokio::spawn(async move {
        serve(tokio_listener, app)
            .await
            .expect("Server failed");
    });

    format!("http://{}", addr)
}

/// Specification fixtures shipped with the crate
pub fn specification_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("specifications")
}

/// Configuration with only the given checks enabled
pub fn env_with_checks(checks: &[&str]) -> EnvironmentVariables {
    EnvironmentVariables {
        enabled_checks: Some(checks.iter().map(|c| c.to_string()).collect()),
        specification_dir: specification_dir(),
        ..EnvironmentVariables::default()
    }
}

/// A well formed http client span from the requests integration
pub fn http_client_span(span_id: u64) -> Value {
    json!({
        "name": "requests.request",
        "service": "svc",
        "resource": "GET /users",
        "type": "http",
        "error": 0,
        "span_id": span_id,
        "trace_id": 1,
        "parent_id": 0,
        "start": 1_700_000_000_000_000_000u64,
        "duration": 1_000_000,
        "meta": {
            "component": "requests",
            "span.kind": "client",
            "language": "python",
            "http.method": "GET",
            "http.status_code": "200",
            "http.url": "http://localhost:8080/users"
        },
        "metrics": {
            "_dd.top_level": 1,
            "_sampling_priority_v1": 1
        }
    })
}

/// Sends a payload to `/v0.4/traces` with the headers a well behaved tracer sets
pub async fn send_traces(base_url: &str, payload: &Value) -> reqwest::Response {
    let count: usize = payload.as_array().map(Vec::len).unwrap_or_default();
    send_traces_with_headers(
        base_url,
        payload,
        &[
            ("X-Datadog-Trace-Count", count.to_string()),
            ("Datadog-Meta-Tracer-Version", "2.0.0".to_string()),
        ],
    )
    .await
}

/// Sends a payload to `/v0.4/traces` with exactly the given extra headers
pub async fn send_traces_with_headers(
    base_url: &str,
    payload: &Value,
    headers: &[(&str, String)],
) -> reqwest::Response {
    let mut request: reqwest::RequestBuilder = reqwest::Client::new()
        .put(format!("{}/v0.4/traces", base_url))
        .header("Content-Type", "application/json")
        .body(payload.to_string());

    for (name, value) in headers {
        request = request.header(*name, value.as_str());
    }

    request.send().await.expect("Failed to send traces.")
}

/// GETs a session endpoint and parses the JSON envelope
pub async fn get_json(base_url: &str, path: &str) -> (reqwest::StatusCode, Value) {
    let resp: reqwest::Response = reqwest::Client::new()
        .get(format!("{}{}", base_url, path))
        .send()
        .await
        .expect("Failed to execute request.");

    let status: reqwest::StatusCode = resp.status();
    let body: String = resp.text().await.unwrap();
    (status, serde_json::from_str(&body).unwrap())
}
