// Test session route definitions

use axum::{
    middleware::from_fn,
    routing::get,
    Router,
};

use crate::config::state::AppState;
use crate::utils::response_handler::response_wrapper;
use super::handler;

/// Creates router with the session endpoints, all wrapped in the response envelope
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/test/traces", get(handler::traces_handler))
        .route("/test/checks", get(handler::checks_handler))
        .route("/test/trace_check/failures", get(handler::failures_handler))
        .route(
            "/test/session/clear",
            get(handler::clear_handler).post(handler::clear_handler),
        )
        .route("/info", get(handler::info_handler))
        .layer(from_fn(response_wrapper))
}
