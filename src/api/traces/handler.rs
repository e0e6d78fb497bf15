// Trace intake: decode the payload, run the enabled checks, store the traces

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::checks::trace_checks::{
    HttpSpanStructure, MetaTracerVersionHeader, TraceContentLength, TraceCountHeader, TraceStall,
};
use crate::checks::{Check, CheckTrace, Checks, Frame};
use crate::config::state::AppState;
use crate::span_validation::{SpanCheckLogger, SpanTagRulesCheck, SpanTagValidation};
use crate::trace::{decode_traces, Trace};

/// Receives a v0.4 trace payload.
/// Responds 400 with the check report when any check failed, unless error
/// responses are disabled.
#[instrument(name = "traces", skip_all, fields(method = %method, bytes = body.len()))]
pub async fn traces_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes, // Forces body reading and triggers size limits
) -> Response {
    let traces: Vec<Trace> = match decode_traces(&body) {
        Ok(traces) => traces,
        Err(err) => {
            warn!("Rejecting undecodable trace payload: {}", err);
            return (StatusCode::BAD_REQUEST, format!("Invalid trace payload: {err}")).into_response();
        }
    };

    let num_spans: usize = traces.iter().map(Vec::len).sum();
    info!("Received {} trace(s) with {} span(s)", traces.len(), num_spans);

    let mut check_trace: CheckTrace = Frame::new(format!("{method} /v0.4/traces"));
    let span_logger: SpanCheckLogger = state.span_logger.for_request();
    let stall: Option<Duration> =
        run_trace_checks(&state, &mut check_trace, &headers, &traces, &span_logger);
    span_logger.flush().await;

    if let Some(duration) = stall {
        info!("Stalling for {:?} seconds.", duration.as_secs_f64());
        tokio::time::sleep(duration).await;
    }

    let failed: bool = check_trace.has_fails();
    {
        let mut store = state.store.write().await;
        store.traces.extend(traces);
        if failed {
            store.failures.push(check_trace.clone());
        }
    }

    if failed {
        warn!("Trace checks failed:\n{}", check_trace);
        if !state.environment.disable_error_responses {
            return (StatusCode::BAD_REQUEST, format!("Check failures:\n{check_trace}")).into_response();
        }
    }

    Json(json!({ "rate_by_service": {} })).into_response()
}

/// Runs every enabled check on the request into `frame`.
/// Span validation failures are queued on `span_logger` for the caller to flush.
/// Returns how long the request should stall before answering.
pub fn run_trace_checks(
    state: &AppState,
    frame: &mut Frame,
    headers: &HeaderMap,
    traces: &[Trace],
    span_logger: &SpanCheckLogger,
) -> Option<Duration> {
    let checks: &Checks = &state.checks;
    let mut stall: Option<Duration> = None;

    checks.run::<TraceCountHeader, _>(frame, |outcome| {
        TraceCountHeader::check(outcome, headers, traces.len())
    });
    checks.run::<MetaTracerVersionHeader, _>(frame, |outcome| {
        MetaTracerVersionHeader::check(outcome, headers)
    });
    checks.run::<TraceContentLength, _>(frame, |outcome| {
        TraceContentLength::check(outcome, headers)
    });
    checks.run::<TraceStall, _>(frame, |outcome| {
        stall = TraceStall::duration(outcome, headers, state.environment.trace_request_delay)
    });
    checks.run::<HttpSpanStructure, _>(frame, |outcome| {
        HttpSpanStructure::check(outcome, traces)
    });

    if checks.is_enabled::<SpanTagValidation>() {
        match state.spec_loader.as_deref() {
            Some(loader) => SpanTagValidation::check(frame, traces, loader, span_logger),
            None => frame
                .add_check(SpanTagValidation::NAME)
                .fail("No span specifications are loaded"),
        }
    }

    checks.run::<SpanTagRulesCheck, _>(frame, |outcome| {
        SpanTagRulesCheck::check(outcome, traces, state.spec_loader.as_deref(), span_logger)
    });

    stall
}
