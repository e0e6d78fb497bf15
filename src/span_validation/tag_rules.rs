// Rule sets for the rule driven span tag validator

use once_cell::sync::Lazy;
use serde_json::Value;

use super::tag_checks::SpanTagChecks;

/// Tags a span must carry, may carry, or must carry with a given value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanTagRules {
    pub name: String,
    pub span_type: Option<String>,
    pub tag_comparisons: Vec<(String, Value)>,
    pub required_tags: Vec<String>,
    pub optional_tags: Vec<String>,
}

impl SpanTagRules {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn span_type(mut self, span_type: impl Into<String>) -> Self {
        self.span_type = Some(span_type.into());
        self
    }

    pub fn compare(mut self, tag: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tag_comparisons.push((tag.into(), value.into()));
        self
    }

    pub fn required<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn optional<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// A spec file's checks as rules: valued tags become comparisons,
/// required tags stay required, everything else is optional.
impl From<&SpanTagChecks> for SpanTagRules {
    fn from(checks: &SpanTagChecks) -> Self {
        let mut rules: SpanTagRules = SpanTagRules::new(&checks.name);
        rules.span_type = checks.span_type.clone();

        for tag in &checks.tag_checks {
            match (&tag.value, tag.required) {
                (Some(value), _) => rules.tag_comparisons.push((tag.name.clone(), value.clone())),
                (None, true) => rules.required_tags.push(tag.name.clone()),
                (None, false) => rules.optional_tags.push(tag.name.clone()),
            }
        }
        rules
    }
}

pub static GENERAL_SPAN_RULES: Lazy<SpanTagRules> = Lazy::new(|| {
    SpanTagRules::new("general").required(["error"]).optional([
        "language",
        "span.kind",
        "runtime-id",
        "process_id",
        "_dd.base_service",
        "_dd.origin",
        "_dd.hostname",
        "_dd.p.dm",
        "_dd.p.tid",
    ])
});

pub static ERROR_SPAN_RULES: Lazy<SpanTagRules> = Lazy::new(|| {
    SpanTagRules::new("error")
        .required(["error.type"])
        .optional(["error.message", "error.msg", "error.stack"])
});

pub static INTERNAL_SPAN_RULES: Lazy<SpanTagRules> = Lazy::new(|| {
    SpanTagRules::new("internal").optional([
        "_dd.agent_psr",
        "_dd.rule_psr",
        "_dd.limit_psr",
        "_sampling_priority_v1",
        "_dd.top_level",
        "_dd.measured",
        "_dd.tracer_kr",
        "_dd.dm.inherited",
        "_dd.dm.service_hash",
        "_dd.dm.resource",
        "_dd.span_links",
        "_dd.parent_id",
    ])
});

static HTTP_SPAN_RULES: Lazy<SpanTagRules> = Lazy::new(|| {
    SpanTagRules::new("http")
        .span_type("http")
        .required(["http.method", "http.status_code", "http.url"])
        .optional([
            "http.useragent",
            "http.route",
            "http.client_ip",
            "http.query.string",
            "http.version",
            "http.retries_remain",
            "http.endpoint",
            "network.client.ip",
            "out.host",
            "peer.hostname",
        ])
});

/// Built-in rules for a span type, if that type has any
pub fn type_span_tag_rules(span_type: &str) -> Option<&'static SpanTagRules> {
    match span_type {
        "http" => Some(&*HTTP_SPAN_RULES),
        _ => None,
    }
}
