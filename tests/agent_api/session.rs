//! tests/agent_api/session.rs
//! Test session endpoints and their JSON envelope.

#[path = "../common/mod.rs"]
mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn checks_lists_every_check_with_its_state() {
    let base_url: String = common::spawn_app();

    let (status, body) = common::get_json(&base_url, "/test/checks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["code"], 200);

    let checks: &Vec<Value> = body["data"].as_array().unwrap();
    let enabled = |name: &str| -> bool {
        checks
            .iter()
            .find(|c: &&Value| c["name"] == name)
            .and_then(|c: &Value| c["enabled"].as_bool())
            .unwrap()
    };

    assert_eq!(checks.len(), 7);
    assert!(enabled("trace_count_header"));
    assert!(enabled("trace_stall"));
    assert!(!enabled("span_tag_validation"));
    assert!(!enabled("span_tag_rules"));
}

#[tokio::test]
async fn clear_forgets_traces_and_failures() {
    let base_url: String = common::spawn_app();

    // One valid request and one that fails the header checks
    common::send_traces(&base_url, &json!([[common::http_client_span(1)]])).await;
    common::send_traces_with_headers(&base_url, &json!([[common::http_client_span(2)]]), &[]).await;

    let (status, traces) = common::get_json(&base_url, "/test/traces").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(traces["data"].as_array().unwrap().len(), 2);

    let resp: reqwest::Response = reqwest::Client::new()
        .post(format!("{}/test/session/clear", base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(resp.status(), StatusCode::OK);

    let (_, traces) = common::get_json(&base_url, "/test/traces").await;
    assert!(traces["data"].as_array().unwrap().is_empty());

    let (status, failures) = common::get_json(&base_url, "/test/trace_check/failures").await;
    assert_eq!(status, StatusCode::OK);
    assert!(failures["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn failure_report_renders_the_check_tree() {
    let base_url: String = common::spawn_app();
    common::send_traces_with_headers(&base_url, &json!([[common::http_client_span(1)]]), &[]).await;

    let (status, body) = common::get_json(&base_url, "/test/trace_check/failures").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "BAD_REQUEST");

    let report: &str = body["data"][0]["report"].as_str().unwrap();
    assert!(report.starts_with("PUT /v0.4/traces"), "{report}");
    assert!(report.contains("- trace_content_length passed"), "{report}");
    assert!(report.contains("- meta_tracer_version_header FAILED"), "{report}");
}

#[tokio::test]
async fn info_describes_the_agent() {
    let base_url: String = common::spawn_app();

    let (status, body) = common::get_json(&base_url, "/info").await;
    assert_eq!(status, StatusCode::OK);

    let data: &Value = &body["data"];
    assert_eq!(data["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(data["trace_language"], "default");
    assert!(data["endpoints"]
        .as_array()
        .unwrap()
        .contains(&json!("/v0.4/traces")));
}
