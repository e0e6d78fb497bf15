// Span validation against the language and integration specification files

use serde_json::{Map, Value};

use super::error::SpecError;
use super::span_check_logger::SpanCheckLogger;
use super::tag_checks::{GeneralChecks, SpanChecks, SpanTagChecks, SpanTagChecksLoader};
use super::{IGNORED_TAGS, SPAN_TYPES, TESTED_SPAN_TYPES};
use crate::checks::{CheckOutcome, Frame};
use crate::trace::Span;

/// Validates one span against every spec that applies to it and reports the
/// tags none of them asserted on.
#[derive(Debug)]
pub struct SpanTagValidationCheck<'a> {
    span: &'a Span,
    language: String,
    span_tags_checks: Vec<SpanTagChecks>,
    validate_all_tags: bool,
}

impl<'a> SpanTagValidationCheck<'a> {
    /// Resolves the ordered checks for `span`:
    /// general, error (error spans only), internal, first-in-chunk, type, integration.
    pub fn new(
        span: &'a Span,
        loader: &SpanTagChecksLoader,
        found: SpanChecks,
        first_in_chunk_span_check: Option<SpanTagChecks>,
    ) -> Result<Self, SpecError> {
        let language: String = Self::span_language(span, loader).to_string();

        let GeneralChecks {
            general,
            error,
            internal,
        } = loader.general_checks(&language)?;

        let mut span_tags_checks: Vec<SpanTagChecks> = vec![general];
        if span.is_error() {
            span_tags_checks.push(error);
        }
        span_tags_checks.push(internal);
        span_tags_checks.extend(first_in_chunk_span_check);

        let SpanChecks {
            integration_span_check,
            type_span_check,
        } = found;

        span_tags_checks.extend(type_span_check);

        // Leftover tags only fail integration spans of a type we have a spec for
        let validate_all_tags: bool = integration_span_check.is_some()
            && span
                .span_type()
                .is_some_and(|t: &str| SPAN_TYPES.contains(&t) && TESTED_SPAN_TYPES.contains(&t));

        span_tags_checks.extend(integration_span_check);

        Ok(Self {
            span,
            language,
            span_tags_checks,
            validate_all_tags,
        })
    }

    /// Language whose general specs apply: the span's own, else the configured one
    pub fn span_language<'s>(span: &'s Span, loader: &'s SpanTagChecksLoader) -> &'s str {
        span.get("language")
            .and_then(Value::as_str)
            .unwrap_or(loader.language())
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn validate_all_tags(&self) -> bool {
        self.validate_all_tags
    }

    pub fn check_names(&self) -> Vec<&str> {
        self.span_tags_checks
            .iter()
            .map(|c: &SpanTagChecks| c.name.as_str())
            .collect()
    }

    /// Flattened span tags minus the identity fields no spec asserts on
    pub fn extract_tags(span: &Span) -> Map<String, Value> {
        let mut tags: Map<String, Value> = span.flatten();
        tags.retain(|key: &String, _| !IGNORED_TAGS.contains(&key.as_str()));
        tags
    }

    /// Runs every check into `frame`, then records the unvalidated tag outcome
    /// under `outcome_name`. Returns the tags no check asserted on.
    pub fn check(
        &self,
        frame: &mut Frame,
        outcome_name: &str,
        logger: &SpanCheckLogger,
    ) -> Map<String, Value> {
        let span_name: &str = self.span.name();
        logger.print_intro_message(span_name, &self.check_names());

        let flattened: Map<String, Value> = self.span.flatten();
        let mut leftover: Map<String, Value> = Self::extract_tags(self.span);

        for span_tags_check in &self.span_tags_checks {
            span_tags_check.check(frame, span_name, &flattened, &mut leftover, logger);
        }

        let outcome: &mut CheckOutcome = frame.add_check(outcome_name);
        if leftover.is_empty() {
            logger.print_validation_success(span_name);
            return leftover;
        }

        if self.validate_all_tags {
            let last: &str = self
                .span_tags_checks
                .last()
                .map(|c: &SpanTagChecks| c.name.as_str())
                .unwrap_or_default();
            let keys: Vec<&String> = leftover.keys().collect();
            let message: String = format!(
                "UNVALIDATED-TAGS-ERROR: Span Tag Validation failed for span: {span_name} for Span Tag Check: {last}.{keys:?}"
            );
            logger.log_failure_message_to_file(&message);
            outcome.fail(message);
        }
        logger.warn_tags_not_asserted_on(span_name, &leftover);
        leftover
    }
}
