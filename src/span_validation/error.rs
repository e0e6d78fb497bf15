// Errors raised while loading span specifications or asserting span tags

use std::path::PathBuf;

use thiserror::Error;

/// Failures loading span tag specifications from the specification directory
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Integration Path {0} not found! Ensure you mounted specification directory.")]
    IntegrationPathNotFound(PathBuf),

    #[error("Specification file not found for path {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read specification {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid specification {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("specification {path} has no entry at index {index}")]
    MissingEntry { path: PathBuf, index: usize },

    #[error("unknown tag value type '{0}'; expected one of: string, str, integer, int, float, bool")]
    UnknownValueType(String),
}

/// A span tag assertion that did not hold.
/// Produced by the rule driven validator; the first failing assertion stops validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagAssertionError {
    #[error("TYPE-ASSERTION-ERROR: Expected span: {span} have 'type' tag with value: {expected}")]
    TypeMissing { span: String, expected: String },

    #[error(
        "TYPE-ASSERTION-ERROR: Expected span: {span} actual 'type' tag: {actual} to equal expected 'type' tag: {expected}"
    )]
    TypeMismatch {
        span: String,
        actual: String,
        expected: String,
    },

    #[error("{rules}-ASSERTION-ERROR: Expected span: {span} to have tag: '{tag}' within meta: {present:?}")]
    TagMissing {
        rules: String,
        span: String,
        tag: String,
        present: Vec<String>,
    },

    #[error(
        "{rules}-ASSERTION-ERROR: Expected span: {span} with tag: '{tag}' with value: {actual} to equal expected value: {expected}"
    )]
    TagMismatch {
        rules: String,
        span: String,
        tag: String,
        actual: String,
        expected: String,
    },

    #[error("UNVALIDATED-TAGS-ERROR: Span Tag Validation failed for span: {span} for Span Tag Rules: {rules}. {tags:?}")]
    UnvalidatedTags {
        span: String,
        rules: String,
        tags: Vec<String>,
    },
}
