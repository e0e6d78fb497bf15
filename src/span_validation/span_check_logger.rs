// Console and file reporting for span tag validation

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{info, warn};

const SECTION_INDENT: &str = "--------------------";
const DETAIL_INDENT: &str = "                              ";

/// Reports span validation progress through `tracing` and, when configured,
/// collects failure messages for the failure log file.
/// Clones share the pending lines; `for_request` starts a fresh buffer.
#[derive(Debug, Clone, Default)]
pub struct SpanCheckLogger {
    failure_log: Option<PathBuf>,
    pending: Arc<Mutex<Vec<String>>>,
}

impl SpanCheckLogger {
    pub fn new(failure_log: Option<PathBuf>) -> Self {
        Self {
            failure_log,
            pending: Arc::default(),
        }
    }

    /// Logger writing to the same file with its own pending lines
    pub fn for_request(&self) -> Self {
        Self::new(self.failure_log.clone())
    }

    fn pending(&self) -> MutexGuard<'_, Vec<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Section header, e.g. the start of one spec's checks
    pub fn log_section(&self, message: &str) {
        info!("{SECTION_INDENT}{message}{SECTION_INDENT}");
    }

    /// Indented detail line under the current section
    pub fn log_message(&self, message: &str) {
        info!("{DETAIL_INDENT}{message}");
    }

    pub fn print_intro_message(&self, span_name: &str, check_names: &[&str]) {
        info!(
            "{SECTION_INDENT} Span Tag Validation for span '{}' with checks: {:?} {SECTION_INDENT}",
            span_name, check_names
        );
    }

    pub fn warn_tags_not_asserted_on(&self, span_name: &str, tags: &Map<String, Value>) {
        let names: Vec<&String> = tags.keys().collect();
        warn!(
            "Span '{}' has {} tag(s) that no check asserted on: {:?}",
            span_name,
            names.len(),
            names
        );
    }

    pub fn print_validation_success(&self, span_name: &str) {
        info!("{SECTION_INDENT} Span '{}' validated, every tag was asserted on {SECTION_INDENT}", span_name);
    }

    /// Queues a timestamped failure for the failure log, if one is configured
    pub fn log_failure_message_to_file(&self, message: &str) {
        if self.failure_log.is_some() {
            self.pending().push(format!("{} {}\n", Utc::now().to_rfc3339(), message));
        }
    }

    /// Appends the queued failures to the failure log in one write.
    /// Write errors are logged, never raised.
    pub async fn flush(&self) {
        let Some(path) = &self.failure_log else {
            return;
        };

        let lines: String = self.pending().drain(..).collect();
        if lines.is_empty() {
            return;
        }

        let written: std::io::Result<()> = async {
            let mut file: File = OpenOptions::new().create(true).append(true).open(path).await?;
            file.write_all(lines.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(err) = written {
            warn!("Failed to write failure messages to {}: {}", path.display(), err);
        }
    }
}
