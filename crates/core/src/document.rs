use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TripwireError;

/// Prefix accepted in field paths for compatibility with raw hit layouts.
const SOURCE_PREFIX: &str = "_source.";

/// A single search hit: index/id metadata plus the stored event body.
///
/// Field paths resolve against `source`. Flat keys take precedence over
/// dotted traversal, so `"details.ip"` stored as one key wins over
/// `{"details": {"ip": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl Document {
    /// Wrap an event body with no index metadata.
    pub fn new(source: Value) -> Self {
        Self {
            index: None,
            id: None,
            source,
        }
    }

    /// Wrap an event body with its index and document id.
    pub fn with_address(index: impl Into<String>, id: impl Into<String>, source: Value) -> Self {
        Self {
            index: Some(index.into()),
            id: Some(id.into()),
            source,
        }
    }

    /// Decode a raw hit object (`{"_index", "_id", "_source"}`).
    pub fn from_hit(hit: Value) -> Result<Self, TripwireError> {
        if !hit.is_object() {
            return Err(TripwireError::InvalidDocument(format!(
                "expected hit object, got {}",
                type_name(&hit)
            )));
        }
        Ok(serde_json::from_value(hit)?)
    }

    /// Look up a field by dotted path. `null` counts as absent.
    ///
    /// A leading `_source.` is stripped, so `_source.details.ip` and
    /// `details.ip` address the same field.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let path = path.strip_prefix(SOURCE_PREFIX).unwrap_or(path);
        lookup(&self.source, path).filter(|v| !v.is_null())
    }

    /// Field value rendered as text, for grouping and ranking.
    pub fn get_text(&self, path: &str) -> Option<String> {
        self.get(path).map(value_text)
    }

    /// Whether the field is present and non-null.
    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_some()
    }
}

/// Render a JSON value as grouping text: strings verbatim, everything else
/// as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(v) = root.as_object().and_then(|obj| obj.get(path)) {
        return Some(v);
    }
    if path.contains('.') {
        let parts: Vec<&str> = path.split('.').collect();
        return traverse(root, &parts);
    }
    None
}

/// Follow dotted path segments. Arrays are searched element-wise and the
/// first element resolving the remaining path wins.
fn traverse<'a>(current: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    let Some((head, rest)) = parts.split_first() else {
        return Some(current);
    };

    match current {
        Value::Object(map) => traverse(map.get(*head)?, rest),
        Value::Array(items) => items.iter().find_map(|item| traverse(item, parts)),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
