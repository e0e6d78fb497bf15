//! tests/agent_api/traces.rs
//! Trace intake: the default checks, error responses and stalls.

#[path = "../common/mod.rs"]
mod common;

use std::time::{Duration, Instant};

use apm_test_agent::config::environment::EnvironmentVariables;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn accepts_well_formed_traces() {
    let base_url: String = common::spawn_app();
    let payload: Value = json!([[common::http_client_span(1)], [common::http_client_span(2)]]);

    let resp: reqwest::Response = common::send_traces(&base_url, &payload).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "rate_by_service": {} }));

    let (status, stored) = common::get_json(&base_url, "/test/traces").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn missing_trace_count_header_is_rejected() {
    let base_url: String = common::spawn_app();
    let payload: Value = json!([[common::http_client_span(1)]]);

    let resp: reqwest::Response = common::send_traces_with_headers(
        &base_url,
        &payload,
        &[("Datadog-Meta-Tracer-Version", "2.0.0".to_string())],
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: String = resp.text().await.unwrap();
    assert!(body.starts_with("Check failures:"), "{body}");
    assert!(body.contains("- trace_count_header FAILED"), "{body}");
    assert!(body.contains("X-Datadog-Trace-Count header not found in headers"), "{body}");
}

#[tokio::test]
async fn mismatched_trace_count_is_reported() {
    let base_url: String = common::spawn_app();
    let payload: Value = json!([[common::http_client_span(1)]]);

    let resp: reqwest::Response = common::send_traces_with_headers(
        &base_url,
        &payload,
        &[
            ("X-Datadog-Trace-Count", "3".to_string()),
            ("Datadog-Meta-Tracer-Version", "2.0.0".to_string()),
        ],
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: String = resp.text().await.unwrap();
    assert!(
        body.contains("X-Datadog-Trace-Count value (3) does not match actual number of traces (1)"),
        "{body}"
    );
}

#[tokio::test]
async fn disabled_error_responses_still_record_failures() {
    let base_url: String = common::spawn_app_with(EnvironmentVariables {
        disable_error_responses: true,
        ..EnvironmentVariables::default()
    });
    let payload: Value = json!([[common::http_client_span(1)]]);

    let resp: reqwest::Response = common::send_traces_with_headers(&base_url, &payload, &[]).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, failures) = common::get_json(&base_url, "/test/trace_check/failures").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let reports: &Vec<Value> = failures["data"].as_array().unwrap();
    assert_eq!(reports.len(), 1);

    let failed: Vec<&str> = reports[0]["failed_checks"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c: &Value| c["name"].as_str())
        .collect();
    assert_eq!(failed, vec!["trace_count_header", "meta_tracer_version_header"]);
}

#[tokio::test]
async fn invalid_payload_is_rejected() {
    let base_url: String = common::spawn_app();

    let resp: reqwest::Response = reqwest::Client::new()
        .put(format!("{}/v0.4/traces", base_url))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to send traces.");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: String = resp.text().await.unwrap();
    assert!(body.starts_with("Invalid trace payload:"), "{body}");
}

#[tokio::test]
async fn stall_header_delays_the_response() {
    let base_url: String = common::spawn_app();
    let payload: Value = json!([[common::http_client_span(1)]]);

    let started: Instant = Instant::now();
    let resp: reqwest::Response = common::send_traces_with_headers(
        &base_url,
        &payload,
        &[
            ("X-Datadog-Trace-Count", "1".to_string()),
            ("Datadog-Meta-Tracer-Version", "2.0.0".to_string()),
            ("X-Datadog-Test-Stall-Seconds", "0.5".to_string()),
        ],
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn only_enabled_checks_run() {
    let base_url: String = common::spawn_app_with(common::env_with_checks(&["trace_content_length"]));
    let payload: Value = json!([[common::http_client_span(1)]]);

    // Neither count nor version header, but those checks are off
    let resp: reqwest::Response = common::send_traces_with_headers(&base_url, &payload, &[]).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, _) = common::get_json(&base_url, "/test/trace_check/failures").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn http_client_span_without_status_code_fails() {
    let base_url: String = common::spawn_app();
    let mut span: Value = common::http_client_span(1);
    span["meta"].as_object_mut().unwrap().remove("http.status_code");

    let resp: reqwest::Response = common::send_traces(&base_url, &json!([[span]])).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: String = resp.text().await.unwrap();
    assert!(body.contains("- span_spec_http_client FAILED"), "{body}");
    assert!(body.contains("Tag 'http.status_code' is not present."), "{body}");
}
