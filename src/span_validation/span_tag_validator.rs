// Rule driven span tag validation.
// Unlike the spec-file checks, validation stops at the first failed assertion.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::info;

use super::error::TagAssertionError;
use super::span_check_logger::SpanCheckLogger;
use super::tag_checks::display_value;
use super::tag_rules::{SpanTagRules, ERROR_SPAN_RULES, GENERAL_SPAN_RULES, INTERNAL_SPAN_RULES};
use super::IGNORED_TAGS;
use crate::trace::Span;

#[derive(Debug, Clone)]
pub struct SpanTagValidator {
    span_tag_rules_list: Vec<SpanTagRules>,
    type_span_rules_exist: bool,
    validate_all_tags: bool,
    logger: SpanCheckLogger,
}

impl SpanTagValidator {
    pub fn new(
        type_span_rules: Option<SpanTagRules>,
        integration_base_span_rules: Option<SpanTagRules>,
        integration_root_span_rules: Option<SpanTagRules>,
        first_in_chunk_span_rules: Option<SpanTagRules>,
    ) -> Self {
        let type_span_rules_exist: bool = type_span_rules.is_some();
        // No leftover tags are tolerated once both integration rule sets are known
        let validate_all_tags: bool =
            integration_base_span_rules.is_some() && integration_root_span_rules.is_some();

        let mut span_tag_rules_list: Vec<SpanTagRules> =
            vec![GENERAL_SPAN_RULES.clone(), INTERNAL_SPAN_RULES.clone()];
        span_tag_rules_list.extend(
            [
                first_in_chunk_span_rules,
                type_span_rules,
                integration_base_span_rules,
                integration_root_span_rules,
            ]
            .into_iter()
            .flatten(),
        );

        Self {
            span_tag_rules_list,
            type_span_rules_exist,
            validate_all_tags,
            logger: SpanCheckLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: SpanCheckLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Names of the rule sets `span` is validated against, in order
    pub fn rule_names(&self, span: &Span) -> Vec<&str> {
        self.rules_for(span)
            .into_iter()
            .map(|rules: &SpanTagRules| rules.name.as_str())
            .collect()
    }

    fn rules_for(&self, span: &Span) -> Vec<&SpanTagRules> {
        let mut rules: Vec<&SpanTagRules> = self.span_tag_rules_list.iter().collect();
        if span.is_error() {
            rules.insert(1, &*ERROR_SPAN_RULES);
        }
        rules
    }

    /// Validates `span` against every rule set.
    /// Returns the tags no rule asserted on when they are tolerated.
    pub fn validate(&self, span: &Span) -> Result<Map<String, Value>, TagAssertionError> {
        let rules_list: Vec<&SpanTagRules> = self.rules_for(span);
        // The last rule set added is the main validation rule
        let main_rules: &str = rules_list.last().map(|r: &&SpanTagRules| r.name.as_str()).unwrap_or_default();

        // With a span type but no rules for it, leftovers cannot be judged
        let validate_all_tags: bool =
            self.validate_all_tags && (span.span_type().is_none() || self.type_span_rules_exist);

        let names: Vec<&str> = rules_list.iter().map(|r: &&SpanTagRules| r.name.as_str()).collect();
        self.logger.print_intro_message(span.name(), &names);

        let mut run: ValidationRun<'_> = ValidationRun {
            span,
            tags: self.extract_tags(span),
            kept_for_later_match: HashSet::new(),
        };

        for (position, rules) in rules_list.iter().enumerate() {
            run.kept_for_later_match = compared_tags(&rules_list[position + 1..]);
            run.validate(rules)?;
        }

        if run.tags.is_empty() {
            self.logger.print_validation_success(span.name());
            return Ok(run.tags);
        }

        if validate_all_tags {
            return Err(TagAssertionError::UnvalidatedTags {
                span: span.name().to_string(),
                rules: main_rules.to_string(),
                tags: run.tags.keys().cloned().collect(),
            });
        }

        self.logger.warn_tags_not_asserted_on(span.name(), &run.tags);
        Ok(run.tags)
    }

    fn extract_tags(&self, span: &Span) -> Map<String, Value> {
        let mut tags: Map<String, Value> = span.flatten();
        tags.retain(|key: &String, _| {
            // `type` is asserted by the type rules when there are any
            !IGNORED_TAGS.contains(&key.as_str()) && !(key == "type" && self.type_span_rules_exist)
        });
        tags
    }
}

/// Tags whose value a later rule set still compares
fn compared_tags(later: &[&SpanTagRules]) -> HashSet<String> {
    later
        .iter()
        .flat_map(|rules: &&SpanTagRules| rules.tag_comparisons.iter())
        .map(|(tag, _)| tag.clone())
        .collect()
}

/// State of one span's validation: the tags not yet asserted on
struct ValidationRun<'a> {
    span: &'a Span,
    tags: Map<String, Value>,
    /// Asserted on now but only removed by the comparison that needs them
    kept_for_later_match: HashSet<String>,
}

impl ValidationRun<'_> {
    fn validate(&mut self, rules: &SpanTagRules) -> Result<(), TagAssertionError> {
        self.type_validator(rules)?;
        self.matching_tag_validator(rules)?;
        self.required_tag_validator(rules)?;
        self.optional_tag_validator(rules);
        Ok(())
    }

    fn type_validator(&self, rules: &SpanTagRules) -> Result<(), TagAssertionError> {
        let Some(expected) = rules.span_type.as_deref() else {
            return Ok(());
        };

        match self.span.span_type() {
            None => Err(TagAssertionError::TypeMissing {
                span: self.span.name().to_string(),
                expected: expected.to_string(),
            }),
            Some(actual) if actual != expected => Err(TagAssertionError::TypeMismatch {
                span: self.span.name().to_string(),
                actual: actual.to_string(),
                expected: expected.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    fn missing(&self, rules: &SpanTagRules, tag: &str) -> TagAssertionError {
        TagAssertionError::TagMissing {
            rules: rules.name.to_uppercase(),
            span: self.span.name().to_string(),
            tag: tag.to_string(),
            present: self.tags.keys().cloned().collect(),
        }
    }

    fn matching_tag_validator(&mut self, rules: &SpanTagRules) -> Result<(), TagAssertionError> {
        if rules.tag_comparisons.is_empty() {
            info!("No tag comparisons to assert on for tag rules {}", rules.name);
            return Ok(());
        }

        info!("Asserting on span {} tags matching", rules.name);
        for (tag, expected) in &rules.tag_comparisons {
            let Some(actual) = self.tags.get(tag) else {
                return Err(self.missing(rules, tag));
            };
            if actual != expected {
                return Err(TagAssertionError::TagMismatch {
                    rules: rules.name.to_uppercase(),
                    span: self.span.name().to_string(),
                    tag: tag.clone(),
                    actual: display_value(actual),
                    expected: display_value(expected),
                });
            }
            self.tags.remove(tag);
            info!("Validated presence of {} tag with value {}", tag, display_value(expected));
        }
        Ok(())
    }

    fn required_tag_validator(&mut self, rules: &SpanTagRules) -> Result<(), TagAssertionError> {
        if rules.required_tags.is_empty() {
            info!("No required tags to assert on for tag rules {}", rules.name);
            return Ok(());
        }

        info!("Asserting on span {} required tags", rules.name);
        for tag in &rules.required_tags {
            if !self.tags.contains_key(tag) {
                return Err(self.missing(rules, tag));
            }
            info!("Required Tag {} validated.", tag);

            if !self.kept_for_later_match.contains(tag) {
                self.tags.remove(tag);
            }
        }
        Ok(())
    }

    fn optional_tag_validator(&mut self, rules: &SpanTagRules) {
        if rules.optional_tags.is_empty() {
            info!("No optional tags to assert on for tag rules {}", rules.name);
            return;
        }

        info!("Asserting on span {} optional tags", rules.name);
        for tag in &rules.optional_tags {
            if self.kept_for_later_match.contains(tag) {
                continue;
            }
            if self.tags.remove(tag).is_some() {
                info!("Optional Tag {} validated.", tag);
            }
        }
    }
}
