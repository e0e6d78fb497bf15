//! tests/agent_api/global_errors.rs
//! Errors raised by the global layers rather than by a handler.

#[path = "../common/mod.rs"]
mod common;

use apm_test_agent::config::environment::EnvironmentVariables;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn unknown_route_is_not_found() {
    let base_url: String = common::spawn_app();

    let resp: reqwest::Response = reqwest::Client::new()
        .get(format!("{}/v0.3/traces", base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let base_url: String = common::spawn_app_with(EnvironmentVariables {
        max_request_body_size: 1024,
        ..EnvironmentVariables::default()
    });

    let spans: Vec<Value> = (0..64).map(common::http_client_span).collect();
    let payload: Value = json!([spans]);

    let resp: reqwest::Response = common::send_traces(&base_url, &payload).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn stall_longer_than_the_timeout_times_out() {
    let base_url: String = common::spawn_app_with(EnvironmentVariables {
        default_timeout_seconds: 1,
        ..EnvironmentVariables::default()
    });
    let payload: Value = json!([[common::http_client_span(1)]]);

    let resp: reqwest::Response = common::send_traces_with_headers(
        &base_url,
        &payload,
        &[
            ("X-Datadog-Trace-Count", "1".to_string()),
            ("Datadog-Meta-Tracer-Version", "2.0.0".to_string()),
            ("X-Datadog-Test-Stall-Seconds", "2".to_string()),
        ],
    )
    .await;

    assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(resp.text().await.unwrap(), "Request timeout");
}
