// Span and trace model for incoming trace payloads

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single span as sent by a tracer.
/// Spans are kept as raw JSON objects so that unknown keys survive and tag
/// values keep their original JSON type for validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Span(Map<String, Value>);

/// A trace chunk: the ordered spans sent together for one trace.
pub type Trace = Vec<Span>;

impl Span {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Span name, empty when the tracer did not send one
    pub fn name(&self) -> &str {
        self.0.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    /// Span type (`http`, `sql`, ...), `None` when missing or empty
    pub fn span_type(&self) -> Option<&str> {
        self.0
            .get("type")
            .and_then(Value::as_str)
            .filter(|t: &&str| !t.is_empty())
    }

    pub fn meta(&self) -> Option<&Map<String, Value>> {
        self.0.get("meta").and_then(Value::as_object)
    }

    /// Looks up a string tag in `meta`
    pub fn meta_str(&self, tag: &str) -> Option<&str> {
        self.meta()
            .and_then(|meta: &Map<String, Value>| meta.get(tag))
            .and_then(Value::as_str)
    }

    /// True when the span carries `error: 1` (or `true`)
    pub fn is_error(&self) -> bool {
        match self.0.get("error") {
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }

    /// Flattens nested objects (`meta`, `metrics`, ...) into a single map.
    /// Keys met later overwrite earlier ones.
    pub fn flatten(&self) -> Map<String, Value> {
        let mut flat: Map<String, Value> = Map::new();
        flatten_into(&self.0, &mut flat);
        flat
    }
}

fn flatten_into(source: &Map<String, Value>, target: &mut Map<String, Value>) {
    for (key, value) in source {
        match value {
            Value::Object(inner) => flatten_into(inner, target),
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

impl From<Map<String, Value>> for Span {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Decodes a JSON v0.4 payload: a list of traces, each a list of spans.
pub fn decode_traces(body: &[u8]) -> serde_json::Result<Vec<Trace>> {
    serde_json::from_slice(body)
}
