// Test session handlers: inspect and reset what the agent has received

use axum::{extract::State, http::StatusCode};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::checks::{registered_checks, CheckInfo, CheckOutcome, CheckTrace};
use crate::config::state::AppState;
use crate::utils::response_handler::HandlerResponse;

/// Endpoints this agent serves, reported by `/info`
pub const ENDPOINTS: &[&str] = &[
    "/v0.4/traces",
    "/test/traces",
    "/test/checks",
    "/test/trace_check/failures",
    "/test/session/clear",
    "/info",
];

#[derive(Debug, Serialize)]
struct CheckStatus {
    #[serde(flatten)]
    info: CheckInfo,
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct FailureReport<'a> {
    report: String,
    failed_checks: Vec<&'a CheckOutcome>,
    trace: &'a CheckTrace,
}

/// Returns every trace received in this session
#[instrument(skip(state))]
pub async fn traces_handler(State(state): State<AppState>) -> HandlerResponse {
    let store = state.store.read().await;
    info!("Returning {} stored trace(s)", store.traces.len());

    HandlerResponse::new(StatusCode::OK)
        .data(json!(store.traces))
        .message(format!("{} trace(s) received", store.traces.len()))
}

/// Lists the known checks and whether each one is enabled
#[instrument(skip(state))]
pub async fn checks_handler(State(state): State<AppState>) -> HandlerResponse {
    let checks: Vec<CheckStatus> = registered_checks()
        .into_iter()
        .map(|info: CheckInfo| CheckStatus {
            enabled: state.checks.is_enabled_by_name(info.name),
            info,
        })
        .collect();

    HandlerResponse::new(StatusCode::OK).data(json!(checks))
}

/// Returns the check reports of every failed trace request
#[instrument(skip(state))]
pub async fn failures_handler(State(state): State<AppState>) -> HandlerResponse {
    let store = state.store.read().await;

    let reports: Vec<FailureReport<'_>> = store
        .failures
        .iter()
        .map(|trace: &CheckTrace| FailureReport {
            report: trace.to_string(),
            failed_checks: trace.failed_checks(),
            trace,
        })
        .collect();

    let status: StatusCode = if reports.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    HandlerResponse::new(status)
        .message(format!("{} failed trace request(s)", reports.len()))
        .data(json!(reports))
}

/// Forgets every trace and failure of the current session
#[instrument(skip(state))]
pub async fn clear_handler(State(state): State<AppState>) -> HandlerResponse {
    state.clear_session().await;
    HandlerResponse::new(StatusCode::OK).message("Test session cleared")
}

/// Agent version, endpoints and host
#[instrument(skip(state))]
pub async fn info_handler(State(state): State<AppState>) -> HandlerResponse {
    let host: String = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());

    HandlerResponse::new(StatusCode::OK).data(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ENDPOINTS,
        "hostname": host,
        "environment": state.environment.environment.as_ref(),
        "trace_language": state.environment.trace_language.as_ref(),
        "span_specifications_loaded": state.spec_loader.is_some(),
    }))
}
