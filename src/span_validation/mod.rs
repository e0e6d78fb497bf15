/*
* Span tag validation: spec-file driven checks (`span_tag_validation`) and the
* rule driven validator (`span_tag_rules`).
*/

pub mod error;
pub mod span_check_logger;
pub mod span_tag_validation_check;
pub mod span_tag_validator;
pub mod tag_checks;
pub mod tag_rules;

use tracing::debug;

use crate::checks::{Check, CheckOutcome, Frame};
use crate::trace::{Span, Trace};

pub use error::{SpecError, TagAssertionError};
pub use span_check_logger::SpanCheckLogger;
pub use span_tag_validation_check::SpanTagValidationCheck;
pub use span_tag_validator::SpanTagValidator;
pub use tag_checks::{SpanChecks, SpanTagChecks, SpanTagChecksLoader, TagCheck, ValueType};
pub use tag_rules::SpanTagRules;

/// Span fields that identify a span rather than describe it; never validated
pub const IGNORED_TAGS: &[&str] = &[
    "span_id",
    "trace_id",
    "duration",
    "start",
    "resource",
    "parent_id",
    "env",
    "version",
    "service",
    "name",
];

pub const SPAN_TYPES: &[&str] = &[
    "cache",
    "cassandra",
    "elasticsearch",
    "grpc",
    "graphql",
    "http",
    "mongodb",
    "redis",
    "sql",
    "template",
    "test",
    "web",
    "worker",
];

/// Span types that have a type specification
pub const TESTED_SPAN_TYPES: &[&str] = &["http"];

pub struct SpanTagValidation;

impl Check for SpanTagValidation {
    const NAME: &'static str = "span_tag_validation";
    const DESCRIPTION: &'static str = "Spans must carry the tags required by the language, span type and \
integration specifications, with the expected values and types. For spans of a tested type emitted by \
a known integration, every tag must be covered by a specification.";
    const DEFAULT_ENABLED: bool = false;
}

impl SpanTagValidation {
    /// Validates every span, one frame per span.
    /// The first span of each trace also gets the language's first-in-chunk spec.
    pub fn check(frame: &mut Frame, traces: &[Trace], loader: &SpanTagChecksLoader, logger: &SpanCheckLogger) {
        for trace in traces {
            for (position, span) in trace.iter().enumerate() {
                let span_frame: &mut Frame = frame.add_frame(format!("Span Tag Validation: {}", span.name()));
                if let Err(err) = Self::check_span(span_frame, span, position == 0, loader, logger) {
                    span_frame.add_check(Self::NAME).fail(err.to_string());
                }
            }
        }
    }

    fn check_span(
        frame: &mut Frame,
        span: &Span,
        first_in_chunk: bool,
        loader: &SpanTagChecksLoader,
        logger: &SpanCheckLogger,
    ) -> Result<(), SpecError> {
        let found: SpanChecks = loader.find_span_tag_check(span)?;
        let first_in_chunk_check: Option<SpanTagChecks> = if first_in_chunk {
            loader.first_in_chunk_check(SpanTagValidationCheck::span_language(span, loader))?
        } else {
            None
        };

        let check: SpanTagValidationCheck<'_> =
            SpanTagValidationCheck::new(span, loader, found, first_in_chunk_check)?;
        check.check(frame, Self::NAME, logger);
        Ok(())
    }
}

pub struct SpanTagRulesCheck;

impl Check for SpanTagRulesCheck {
    const NAME: &'static str = "span_tag_rules";
    const DESCRIPTION: &'static str = "Spans must satisfy the built-in general, error, internal and span type \
tag rules, plus the integration specification when one is mounted. Validation of a span stops at its \
first failed assertion.";
    const DEFAULT_ENABLED: bool = false;
}

impl SpanTagRulesCheck {
    pub fn check(
        outcome: &mut CheckOutcome,
        traces: &[Trace],
        loader: Option<&SpanTagChecksLoader>,
        logger: &SpanCheckLogger,
    ) {
        for span in traces.iter().flatten() {
            let type_rules: Option<SpanTagRules> = span
                .span_type()
                .and_then(tag_rules::type_span_tag_rules)
                .cloned();

            let integration_rules: Option<SpanTagRules> = match loader.map(|l| l.find_span_tag_check(span)) {
                Some(Ok(found)) => found.integration_span_check.as_ref().map(SpanTagRules::from),
                Some(Err(err)) => {
                    outcome.fail(err.to_string());
                    continue;
                }
                None => None,
            };

            let validator: SpanTagValidator =
                SpanTagValidator::new(type_rules, integration_rules, None, None).with_logger(logger.clone());

            match validator.validate(span) {
                Ok(leftover) => debug!("Span '{}' passed tag rules, {} tag(s) left", span.name(), leftover.len()),
                Err(err) => {
                    let message: String = err.to_string();
                    logger.log_failure_message_to_file(&message);
                    outcome.fail(message);
                }
            }
        }
    }
}
