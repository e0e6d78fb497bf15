//! tests/agent_api/span_validation.rs
//! Span tag validation against the bundled specification files.

#[path = "../common/mod.rs"]
mod common;

use apm_test_agent::config::{environment::EnvironmentVariables, state::AppState};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn fully_specified_spans_pass() {
    let base_url: String = common::spawn_app_with(common::env_with_checks(&["span_tag_validation"]));
    let payload: Value = json!([[common::http_client_span(1), common::http_client_span(2)]]);

    let resp: reqwest::Response = common::send_traces(&base_url, &payload).await;
    let status: StatusCode = resp.status();
    let body: String = resp.text().await.unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn tags_outside_every_spec_fail_integration_spans() {
    let base_url: String = common::spawn_app_with(common::env_with_checks(&["span_tag_validation"]));
    let mut span: Value = common::http_client_span(1);
    span["meta"]["custom.tag"] = json!("surprise");

    let resp: reqwest::Response = common::send_traces(&base_url, &json!([[span]])).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: String = resp.text().await.unwrap();
    assert!(body.contains("Span Tag Validation: requests.request"), "{body}");
    assert!(
        body.contains(
            "UNVALIDATED-TAGS-ERROR: Span Tag Validation failed for span: requests.request for Span Tag Check: requests.request."
        ),
        "{body}"
    );
    assert!(body.contains("custom.tag"), "{body}");
}

#[tokio::test]
async fn wrong_integration_value_fails_the_tag_check() {
    let base_url: String = common::spawn_app_with(common::env_with_checks(&["span_tag_validation"]));
    let mut span: Value = common::http_client_span(1);
    span["meta"]["span.kind"] = json!("server");

    let resp: reqwest::Response = common::send_traces(&base_url, &json!([[span]])).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: String = resp.text().await.unwrap();
    assert!(body.contains("- tag 'span.kind' FAILED"), "{body}");
    assert!(body.contains("MATCHING-TAG-ERROR"), "{body}");
}

#[tokio::test]
async fn failures_are_appended_to_the_failure_log() {
    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
    let log_path: std::path::PathBuf = dir.path().join("failures.log");

    let base_url: String = common::spawn_app_with(EnvironmentVariables {
        failure_log_path: Some(log_path.clone()),
        ..common::env_with_checks(&["span_tag_validation"])
    });
    let mut span: Value = common::http_client_span(1);
    span["meta"]["custom.tag"] = json!("surprise");

    let resp: reqwest::Response = common::send_traces(&base_url, &json!([[span]])).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let logged: String = std::fs::read_to_string(&log_path).unwrap();
    assert!(logged.contains("UNVALIDATED-TAGS-ERROR"), "{logged}");
}

#[tokio::test]
async fn tag_rules_accept_fully_specified_spans() {
    let base_url: String = common::spawn_app_with(common::env_with_checks(&["span_tag_rules"]));
    let payload: Value = json!([[common::http_client_span(1), common::http_client_span(2)]]);

    let resp: reqwest::Response = common::send_traces(&base_url, &payload).await;
    let status: StatusCode = resp.status();
    let body: String = resp.text().await.unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn tag_rules_compare_integration_values() {
    let base_url: String = common::spawn_app_with(common::env_with_checks(&["span_tag_rules"]));
    let mut span: Value = common::http_client_span(1);
    span["meta"]["span.kind"] = json!("server");

    let resp: reqwest::Response = common::send_traces(&base_url, &json!([[span]])).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: String = resp.text().await.unwrap();
    assert!(
        body.contains(
            "REQUESTS.REQUEST-ASSERTION-ERROR: Expected span: requests.request with tag: 'span.kind' with value: server to equal expected value: client"
        ),
        "{body}"
    );
}

#[tokio::test]
async fn tag_rules_stop_at_the_first_missing_tag() {
    let base_url: String = common::spawn_app_with(common::env_with_checks(&["span_tag_rules"]));
    let mut span: Value = common::http_client_span(1);
    span["meta"].as_object_mut().unwrap().remove("http.url");

    let resp: reqwest::Response = common::send_traces(&base_url, &json!([[span]])).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: String = resp.text().await.unwrap();
    assert!(body.contains("- span_tag_rules FAILED"), "{body}");
    assert!(
        body.contains("HTTP-ASSERTION-ERROR: Expected span: requests.request to have tag: 'http.url'"),
        "{body}"
    );
}

#[test]
fn enabling_validation_without_specifications_fails_startup() {
    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();

    let result = AppState::new(EnvironmentVariables {
        enabled_checks: Some(vec!["span_tag_validation".to_string()]),
        specification_dir: dir.path().join("missing"),
        ..EnvironmentVariables::default()
    });

    let err: anyhow::Error = result.unwrap_err();
    assert!(format!("{err:#}").contains("Ensure you mounted specification directory"));
}

#[test]
fn missing_specifications_are_fine_when_validation_is_off() {
    let dir: tempfile::TempDir = tempfile::tempdir().unwrap();

    let state: AppState = AppState::new(EnvironmentVariables {
        specification_dir: dir.path().join("missing"),
        ..EnvironmentVariables::default()
    })
    .unwrap();

    assert!(state.spec_loader.is_none());
}
