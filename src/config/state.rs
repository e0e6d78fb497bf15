// Application state shared by every handler

use std::sync::Arc;

use anyhow::Context;
use once_cell::sync::Lazy;
use tokio::sync::RwLock;

use crate::checks::{Checks, CheckTrace};
use crate::config::environment::EnvironmentVariables;
use crate::span_validation::{SpanCheckLogger, SpanTagChecksLoader, SpanTagValidation};
use crate::trace::Trace;

/// Traces and check failures received during the current test session
#[derive(Debug, Default)]
pub struct TraceStore {
    pub traces: Vec<Trace>,
    pub failures: Vec<CheckTrace>,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub environment: Arc<EnvironmentVariables>,
    pub checks: Arc<Checks>,
    pub store: Arc<RwLock<TraceStore>>,
    /// Present when the specification directory could be indexed
    pub spec_loader: Option<Arc<SpanTagChecksLoader>>,
    pub span_logger: SpanCheckLogger,
}

impl AppState {
    /// Builds the state from a configuration.
    /// Fails when span tag validation is enabled but the specifications cannot be loaded.
    pub fn new(environment: EnvironmentVariables) -> anyhow::Result<Self> {
        let checks: Checks = Checks::new(environment.enabled_checks.as_deref());

        let spec_loader: Option<Arc<SpanTagChecksLoader>> =
            match SpanTagChecksLoader::new(&environment.specification_dir, environment.trace_language.as_ref()) {
                Ok(loader) => Some(Arc::new(loader)),
                Err(err) if checks.is_enabled::<SpanTagValidation>() => {
                    return Err(err).context("span_tag_validation is enabled but specifications could not be loaded");
                }
                Err(err) => {
                    tracing::debug!("Span specifications not loaded: {}", err);
                    None
                }
            };

        let span_logger: SpanCheckLogger = SpanCheckLogger::new(environment.failure_log_path.clone());

        Ok(Self {
            environment: Arc::new(environment),
            checks: Arc::new(checks),
            store: Arc::new(RwLock::new(TraceStore::default())),
            spec_loader,
            span_logger,
        })
    }

    /// Returns the singleton instance used by the binary
    pub fn instance() -> &'static Self {
        static INSTANCE: Lazy<AppState> = Lazy::new(|| {
            AppState::new(EnvironmentVariables::instance().clone()).expect("Failed to initialize AppState")
        });
        &INSTANCE
    }

    /// Clears the stored traces and failures
    pub async fn clear_session(&self) {
        let mut store = self.store.write().await;
        store.traces.clear();
        store.failures.clear();
        tracing::info!("Test session cleared");
    }

    /// Logs what is left in the session on shutdown
    pub async fn shutdown(&self) {
        let store = self.store.read().await;
        tracing::info!(
            "Shutting down with {} trace(s) and {} failed request(s) recorded",
            store.traces.len(),
            store.failures.len()
        );
    }
}
