// Payload level checks run on every trace request

use std::time::Duration;

use axum::http::HeaderMap;
use serde_json::Value;

use super::{Check, CheckOutcome};
use crate::trace::{Span, Trace};

pub const TRACE_COUNT_HEADER: &str = "X-Datadog-Trace-Count";
pub const TRACER_VERSION_HEADER: &str = "Datadog-Meta-Tracer-Version";
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length";
pub const STALL_SECONDS_HEADER: &str = "X-Datadog-Test-Stall-Seconds";

/// Largest accepted trace payload, in bytes
pub const MAX_CONTENT_LENGTH: u64 = 50_000_000;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub struct TraceCountHeader;

impl Check for TraceCountHeader {
    const NAME: &'static str = "trace_count_header";
    const DESCRIPTION: &'static str = "The number of traces included in a payload must be included as the \
X-Datadog-Trace-Count http header with each payload. The value of the header must match the number \
of traces included in the payload.";
}

impl TraceCountHeader {
    pub fn check(outcome: &mut CheckOutcome, headers: &HeaderMap, num_traces: usize) {
        let Some(raw) = headers.get(TRACE_COUNT_HEADER) else {
            outcome.fail("X-Datadog-Trace-Count header not found in headers");
            return;
        };

        // Negative counts are valid integers that can never match
        let count: i64 = match raw.to_str().ok().and_then(|s: &str| s.trim().parse().ok()) {
            Some(count) => count,
            None => {
                outcome.fail("X-Datadog-Trace-Count header is not a valid integer");
                return;
            }
        };

        if usize::try_from(count).ok() != Some(num_traces) {
            outcome.fail(format!(
                "X-Datadog-Trace-Count value ({count}) does not match actual number of traces ({num_traces})"
            ));
        }
    }
}

pub struct MetaTracerVersionHeader;

impl Check for MetaTracerVersionHeader {
    const NAME: &'static str = "meta_tracer_version_header";
    const DESCRIPTION: &'static str = "v0.4 payloads must include the Datadog-Meta-Tracer-Version header.";
}

impl MetaTracerVersionHeader {
    pub fn check(outcome: &mut CheckOutcome, headers: &HeaderMap) {
        if !headers.contains_key(TRACER_VERSION_HEADER) {
            outcome.fail("Datadog-Meta-Tracer-Version not found in headers");
        }
    }
}

pub struct TraceContentLength;

impl Check for TraceContentLength {
    const NAME: &'static str = "trace_content_length";
    const DESCRIPTION: &'static str = "The max content size of a trace payload is 50MB.";
}

impl TraceContentLength {
    pub fn check(outcome: &mut CheckOutcome, headers: &HeaderMap) {
        let Some(raw) = header_str(headers, CONTENT_LENGTH_HEADER) else {
            outcome.fail(format!(
                "content length header 'Content-Length' not in http headers {headers:?}"
            ));
            return;
        };

        match raw.trim().parse::<u64>() {
            Ok(length) if length > MAX_CONTENT_LENGTH => {
                outcome.fail(format!("content length {length} too large."));
            }
            Ok(_) => {}
            Err(_) => outcome.fail(format!("content length '{raw}' is not a valid integer")),
        }
    }
}

pub struct TraceStall;

impl Check for TraceStall {
    const NAME: &'static str = "trace_stall";
    const DESCRIPTION: &'static str = "Stall the trace (mimicking an overwhelmed or throttled agent) for the \
given duration in seconds.\n\nEnable the check by submitting the X-Datadog-Test-Stall-Seconds http header \
(unit is seconds) with the request.\n\nNote that only the request for this trace is stalled, subsequent \
requests will not be affected.";
}

impl TraceStall {
    /// Resolves how long this request should stall.
    /// The header wins over the configured default; zero or negative means no stall.
    pub fn duration(outcome: &mut CheckOutcome, headers: &HeaderMap, default_delay: f64) -> Option<Duration> {
        let seconds: f64 = match header_str(headers, STALL_SECONDS_HEADER) {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(seconds) => seconds,
                Err(_) => {
                    outcome.fail(format!("{STALL_SECONDS_HEADER} value '{raw}' is not a valid number"));
                    return None;
                }
            },
            None => default_delay,
        };

        if seconds.is_nan() || seconds <= 0.0 {
            return None;
        }

        match Duration::try_from_secs_f64(seconds) {
            Ok(duration) => Some(duration),
            Err(err) => {
                outcome.fail(format!("stall of {seconds} seconds is not a valid duration: {err}"));
                None
            }
        }
    }
}

pub struct HttpSpanStructure;

impl Check for HttpSpanStructure {
    const NAME: &'static str = "span_spec_http_client";
    const DESCRIPTION: &'static str = "The structure of HTTP client spans must match our expectations.";
}

impl HttpSpanStructure {
    pub fn check(outcome: &mut CheckOutcome, traces: &[Trace]) {
        for span in traces.iter().flatten() {
            if span.span_type() == Some("http") && span.meta_str("span.kind") == Some("client") {
                Self::http_client(outcome, span);
            }
        }
    }

    fn http_client(outcome: &mut CheckOutcome, span: &Span) {
        for tag in ["http.method", "http.status_code", "http.url"] {
            Self::tag_is_present(outcome, span, tag);
        }
        Self::tag_matches(outcome, span, "span.kind", "client");
        Self::property_matches(outcome, span, "type", "http");
    }

    fn tag_is_present(outcome: &mut CheckOutcome, span: &Span, tag: &str) {
        let present: bool = span.meta().is_some_and(|meta| meta.contains_key(tag));
        if !present {
            outcome.fail(format!("Tag '{tag}' is not present."));
        }
    }

    fn tag_matches(outcome: &mut CheckOutcome, span: &Span, tag: &str, expected: &str) {
        let actual: Option<&str> = span.meta_str(tag);
        if actual != Some(expected) {
            outcome.fail(format!(
                "Tag '{tag}' has value '{}', expected '{expected}'.",
                actual.unwrap_or_default()
            ));
        }
    }

    fn property_matches(outcome: &mut CheckOutcome, span: &Span, property: &str, expected: &str) {
        let actual: Option<&Value> = span.get(property);
        if actual.and_then(Value::as_str) != Some(expected) {
            let shown: String = actual.map(Value::to_string).unwrap_or_default();
            outcome.fail(format!(
                "Property '{property}' has value '{shown}', expected '{expected}'."
            ));
        }
    }
}
