// Trace intake route definitions

use axum::{
    routing::put,
    Router,
};

use crate::config::state::AppState;
use super::handler;

/// Creates the router tracers submit payloads to.
/// Responses are not wrapped: tracers parse them directly.
pub fn trace_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v0.4/traces",
            put(handler::traces_handler).post(handler::traces_handler),
        )
}
