// Start of file: src/main.rs

use axum::{Router, serve};
use tokio::net::TcpListener;

use apm_test_agent::config::state::AppState;
use apm_test_agent::core::{logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // set up logging
    logging::init_tracing();

    let state: &'static AppState = AppState::instance();
    tracing::info!(
        "{} checks enabled, span specifications {}",
        state.checks.enabled().count(),
        if state.spec_loader.is_some() { "loaded" } else { "not loaded" }
    );

    // build our router
    let app: Router = server::create_app(state.clone());

    let listener: TcpListener = server::setup_listener(&state.environment).await?;

    tracing::info!("Test agent listening on: {}", listener.local_addr()?);

    serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    Ok(())
}

// End of file: src/main.rs
