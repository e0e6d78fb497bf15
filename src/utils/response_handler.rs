// Session envelope: every /test/* and /info response is rewritten into
// `{status, code, data, messages, date}` by `response_wrapper`.

use axum::{
    body::Body,
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, Request, Response, StatusCode,
    },
    middleware::Next,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

/// Body of every session endpoint response
#[derive(Debug, Serialize)]
pub struct SessionEnvelope {
    /// Upper snake case reason phrase, e.g. `BAD_REQUEST`
    pub status: String,
    pub code: u16,
    pub data: Value,
    pub messages: Vec<String>,
    pub date: String,
}

impl SessionEnvelope {
    fn new(status: StatusCode, payload: Option<HandlerResponse>) -> Self {
        let (data, messages) = payload
            .map(|p: HandlerResponse| (p.data, p.messages))
            .unwrap_or_default();

        Self {
            status: status
                .canonical_reason()
                .unwrap_or("UNKNOWN STATUS")
                .to_uppercase()
                .replace(' ', "_"),
            code: status.as_u16(),
            data,
            messages,
            date: Utc::now().to_rfc3339(),
        }
    }
}

/// What a session handler returns; the middleware turns it into a `SessionEnvelope`
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub status_code: StatusCode,
    pub data: Value,
    pub messages: Vec<String>,
}

impl HandlerResponse {
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            data: Value::Null,
            messages: Vec::new(),
        }
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> axum::response::Response {
        let mut response: Response<Body> = Json(json!({
            "data": self.data,
            "messages": self.messages
        }))
        .into_response();

        *response.status_mut() = self.status_code;

        // The middleware reads the payload back from here
        response.extensions_mut().insert(self);
        response
    }
}

/// Wraps session responses in the envelope.
/// Responses that did not come from a `HandlerResponse` (e.g. rejections) get null data.
pub async fn response_wrapper(req: Request<Body>, next: Next) -> Response<Body> {
    let response: Response<Body> = next.run(req).await;
    let (mut parts, _) = response.into_parts();

    let payload: Option<HandlerResponse> = parts.extensions.remove::<HandlerResponse>();
    let envelope: SessionEnvelope = SessionEnvelope::new(parts.status, payload);

    if let Ok(pretty) = serde_json::to_string_pretty(&envelope) {
        debug!("\nFinal response:\n{}", pretty);
    }

    let body: Vec<u8> = serde_json::to_vec(&envelope).unwrap_or_else(|_| b"{}".to_vec());

    // The inner body's length no longer applies
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Response::from_parts(parts, Body::from(body))
}
