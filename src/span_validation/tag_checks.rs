// Span tag checks loaded from JSON specification files

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::error::SpecError;
use super::span_check_logger::SpanCheckLogger;
use super::TESTED_SPAN_TYPES;
use crate::checks::{CheckOutcome, Frame};
use crate::trace::Span;

const SPEC_FILE_SUFFIX: &str = "-spec.json";

// =============================================================================
// VALUE TYPES
// =============================================================================

/// Expected JSON type of a tag value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Integer,
    Float,
    Bool,
}

impl FromStr for ValueType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" | "str" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            other => Err(SpecError::UnknownValueType(other.to_string())),
        }
    }
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Float, Value::Number(n)) => n.is_f64(),
            (Self::Bool, Value::Bool(_)) => true,
            _ => false,
        }
    }
}

/// Name of the JSON type of `value`, for error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Renders a tag value the way it reads in a span: strings without quotes
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// SPEC FILE FORMAT
// =============================================================================

#[derive(Debug, Deserialize)]
struct SpanSpecFile {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    span_type: Option<String>,
    #[serde(default)]
    specification: SpecificationBody,
}

#[derive(Debug, Default, Deserialize)]
struct SpecificationBody {
    #[serde(default)]
    tags: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct TagSpec {
    #[serde(default)]
    required: Option<bool>,
    #[serde(rename = "type", default)]
    val_type: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

// =============================================================================
// TAG CHECK
// =============================================================================

/// Assertion on a single tag of a span
#[derive(Debug, Clone, PartialEq)]
pub struct TagCheck {
    pub name: String,
    pub val_type: Option<ValueType>,
    pub required: bool,
    pub value: Option<Value>,
}

impl TagCheck {
    /// Checks the tag against the flattened span, recording failures in `outcome`
    pub fn check(
        &self,
        outcome: &mut CheckOutcome,
        span_name: &str,
        flattened: &Map<String, Value>,
        span_check_name: &str,
        logger: &SpanCheckLogger,
    ) {
        let fail = |outcome: &mut CheckOutcome, message: String| {
            logger.log_failure_message_to_file(&message);
            outcome.fail(message);
        };
        let actual: Option<&Value> = flattened.get(&self.name);

        if !self.required {
            match actual {
                None => logger.log_message(&format!(
                    "Assertion on span: '{span_name}' having optional tag: '{}' --------> FALSE",
                    self.name
                )),
                Some(actual) => {
                    if let Some(message) = self.type_error(actual) {
                        fail(outcome, message);
                    }
                    logger.log_message(&format!(
                        "Assertion on span: '{span_name}' having optional tag: '{}' --------> TRUE",
                        self.name
                    ));
                }
            }
            return;
        }

        match &self.value {
            Some(expected) => logger.log_message(&format!(
                "Asserting on span '{span_name}' having matching expected tag '{}' with value: '{}'",
                self.name,
                display_value(expected)
            )),
            None => logger.log_message(&format!(
                "Asserting on span: '{span_name}' having required tag: '{}'",
                self.name
            )),
        }

        let Some(actual) = actual else {
            fail(
                outcome,
                format!(
                    "REQUIRED-TAG-ERROR: Expected tag '{}' to be found within span: '{span_name}' during Check: '{span_check_name}'",
                    self.name
                ),
            );
            return;
        };

        match &self.value {
            Some(expected) if actual != expected => fail(
                outcome,
                format!(
                    "MATCHING-TAG-ERROR: Expected tag '{}' to be have value: '{}' for span: '{span_name}' during Check: '{span_check_name}'",
                    self.name,
                    display_value(expected)
                ),
            ),
            Some(_) => {}
            None => {
                if let Some(message) = self.type_error(actual) {
                    fail(outcome, message);
                }
            }
        }
    }

    fn type_error(&self, actual: &Value) -> Option<String> {
        let expected: ValueType = self.val_type?;
        (!expected.matches(actual)).then(|| {
            format!(
                "TAG-VALUE-TYPE-ERROR: Expected tag '{}' to have expected type '{}', got: '{}'",
                self.name,
                expected.as_str(),
                json_type_name(actual)
            )
        })
    }
}

// =============================================================================
// SPAN TAG CHECKS
// =============================================================================

/// All tag checks of one span specification
#[derive(Debug, Clone, PartialEq)]
pub struct SpanTagChecks {
    pub name: String,
    pub span_type: Option<String>,
    pub tag_checks: Vec<TagCheck>,
}

impl SpanTagChecks {
    /// Builds checks from the `specification.tags` object of a spec file
    pub fn from_tags(
        name: impl Into<String>,
        span_type: Option<String>,
        tags: &Map<String, Value>,
    ) -> Result<Self, SpecError> {
        let mut tag_checks: Vec<TagCheck> = Vec::with_capacity(tags.len());

        for (tag_name, raw) in tags {
            let spec: TagSpec = serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
                warn!("Malformed tag spec for '{}', treating as optional: {}", tag_name, err);
                TagSpec::default()
            });

            let val_type: Option<ValueType> = spec
                .val_type
                .as_deref()
                .map(ValueType::from_str)
                .transpose()?;

            tag_checks.push(TagCheck {
                name: tag_name.clone(),
                val_type,
                required: spec.required.unwrap_or(false),
                value: spec.value.filter(|v: &Value| !v.is_null()),
            });
        }

        Ok(Self {
            name: name.into(),
            span_type,
            tag_checks,
        })
    }

    /// Runs every tag check inside a `SpanTagChecks: <name>` frame.
    /// Each checked tag is removed from `leftover`, pass or fail.
    pub fn check(
        &self,
        frame: &mut Frame,
        span_name: &str,
        flattened: &Map<String, Value>,
        leftover: &mut Map<String, Value>,
        logger: &SpanCheckLogger,
    ) {
        logger.log_section(&format!(
            " Asserting on span: {span_name} with Span Tag Checks: {} ",
            self.name
        ));

        let checks_frame: &mut Frame = frame.add_frame(format!("SpanTagChecks: {}", self.name));
        for tag_check in &self.tag_checks {
            let outcome: &mut CheckOutcome = checks_frame.add_check(format!("tag '{}'", tag_check.name));
            tag_check.check(outcome, span_name, flattened, &self.name, logger);
            leftover.remove(&tag_check.name);
        }
    }
}

// =============================================================================
// LOADER
// =============================================================================

/// Checks resolved for a span from its component and type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanChecks {
    pub integration_span_check: Option<SpanTagChecks>,
    pub type_span_check: Option<SpanTagChecks>,
}

/// The language wide checks every span is validated against
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralChecks {
    pub general: SpanTagChecks,
    pub error: SpanTagChecks,
    pub internal: SpanTagChecks,
}

/// Resolves span specifications from a specification directory laid out as
/// `ddtrace/<language>/*-spec.json` and `integration/<component>-spec.json`
#[derive(Debug, Clone)]
pub struct SpanTagChecksLoader {
    ddtrace_spec_path: PathBuf,
    integration_spec_path: PathBuf,
    language: String,
    /// component -> (span spec name -> index in the component's spec file)
    integration_specs: HashMap<String, HashMap<String, usize>>,
}

impl SpanTagChecksLoader {
    /// Indexes every integration spec file under `<root>/integration`
    pub fn new(root: &Path, language: impl Into<String>) -> Result<Self, SpecError> {
        let integration_spec_path: PathBuf = root.join("integration");

        if !integration_spec_path.is_dir() {
            return Err(SpecError::IntegrationPathNotFound(integration_spec_path));
        }

        let entries: fs::ReadDir = fs::read_dir(&integration_spec_path).map_err(|source| SpecError::Io {
            path: integration_spec_path.clone(),
            source,
        })?;

        let mut integration_specs: HashMap<String, HashMap<String, usize>> = HashMap::new();

        for entry in entries {
            let path: PathBuf = entry
                .map_err(|source| SpecError::Io {
                    path: integration_spec_path.clone(),
                    source,
                })?
                .path();

            let Some(component) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n: &str| n.strip_suffix(SPEC_FILE_SUFFIX))
                .map(str::to_string)
            else {
                debug!("Skipping non-spec file {}", path.display());
                continue;
            };

            if !path.is_file() {
                continue;
            }

            let index: HashMap<String, usize> = match read_json(&path)? {
                Value::Array(specs) => specs
                    .iter()
                    .enumerate()
                    .filter_map(|(i, spec): (usize, &Value)| {
                        spec.get("name").and_then(Value::as_str).map(|name: &str| (name.to_string(), i))
                    })
                    .collect(),
                _ => HashMap::new(),
            };

            debug!("Indexed {} span specs for integration '{}'", index.len(), component);
            integration_specs.insert(component, index);
        }

        info!(
            "Loaded span specifications for {} integrations from {}",
            integration_specs.len(),
            integration_spec_path.display()
        );

        Ok(Self {
            ddtrace_spec_path: root.join("ddtrace"),
            integration_spec_path,
            language: language.into(),
            integration_specs,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn integrations(&self) -> impl Iterator<Item = &str> {
        self.integration_specs.keys().map(String::as_str)
    }

    /// Directory holding the language wide specs
    pub fn general_spec_path(&self, language: &str) -> PathBuf {
        self.ddtrace_spec_path.join(language)
    }

    /// Loads one spec file. `spec_index` picks an entry of a list file.
    pub fn load_span_tag_check(&self, path: &Path, spec_index: Option<usize>) -> Result<SpanTagChecks, SpecError> {
        if !path.is_file() {
            return Err(SpecError::FileNotFound(path.to_path_buf()));
        }

        let mut data: Value = read_json(path)?;

        if let Some(index) = spec_index {
            data = match data {
                Value::Array(mut specs) if index < specs.len() => specs.swap_remove(index),
                _ => {
                    return Err(SpecError::MissingEntry {
                        path: path.to_path_buf(),
                        index,
                    })
                }
            };
        }

        let spec: SpanSpecFile = serde_json::from_value(data).map_err(|source| SpecError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        SpanTagChecks::from_tags(spec.name, spec.span_type, &spec.specification.tags)
    }

    pub fn general_checks(&self, language: &str) -> Result<GeneralChecks, SpecError> {
        let dir: PathBuf = self.general_spec_path(language);
        Ok(GeneralChecks {
            general: self.load_span_tag_check(&dir.join("general-spec.json"), None)?,
            error: self.load_span_tag_check(&dir.join("error-spec.json"), None)?,
            internal: self.load_span_tag_check(&dir.join("internal-spec.json"), None)?,
        })
    }

    /// Spec applied to the first span of each trace chunk, when the language has one
    pub fn first_in_chunk_check(&self, language: &str) -> Result<Option<SpanTagChecks>, SpecError> {
        let path: PathBuf = self.general_spec_path(language).join("first-in-chunk-spec.json");
        if !path.is_file() {
            return Ok(None);
        }
        self.load_span_tag_check(&path, None).map(Some)
    }

    fn type_check(&self, span_type: &str) -> Result<SpanTagChecks, SpecError> {
        let path: PathBuf = self
            .general_spec_path(&self.language)
            .join(format!("{span_type}{SPEC_FILE_SUFFIX}"));
        self.load_span_tag_check(&path, None)
    }

    /// Finds the integration and type checks that apply to `span`
    pub fn find_span_tag_check(&self, span: &Span) -> Result<SpanChecks, SpecError> {
        let mut found: SpanChecks = SpanChecks::default();
        let component: &str = span.meta_str("component").unwrap_or_default();

        if let Some(specs) = self.integration_specs.get(component).filter(|_| !component.is_empty()) {
            let index: Option<usize> = specs
                .get(span.name())
                .or_else(|| specs.get(&format!("{component}.*")))
                .copied();

            match index {
                Some(index) => {
                    let path: PathBuf = self
                        .integration_spec_path
                        .join(format!("{component}{SPEC_FILE_SUFFIX}"));
                    let integration: SpanTagChecks = self.load_span_tag_check(&path, Some(index))?;

                    if let Some(span_type) = integration
                        .span_type
                        .as_deref()
                        .filter(|t: &&str| TESTED_SPAN_TYPES.contains(t))
                    {
                        found.type_span_check = Some(self.type_check(span_type)?);
                    }
                    found.integration_span_check = Some(integration);
                }
                None => warn!(
                    "Integration '{}' has no spec for span '{}' and no '{}.*' fallback",
                    component,
                    span.name(),
                    component
                ),
            }
        }

        if found.integration_span_check.is_none() {
            if let Some(span_type) = span.span_type().filter(|t: &&str| TESTED_SPAN_TYPES.contains(t)) {
                found.type_span_check = Some(self.type_check(span_type)?);
            }
        }

        Ok(found)
    }
}

fn read_json(path: &Path) -> Result<Value, SpecError> {
    let raw: String = fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SpecError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
