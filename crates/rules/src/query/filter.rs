//! Filter predicates that compose into a conjunctive query.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a [`Filter::Match`] compares text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// The whole text must appear as a contiguous phrase.
    Phrase,
    /// Free text: any analyzed term may match.
    #[default]
    Boolean,
}

/// A single must-filter. Rules supply an ordered list; the backend applies
/// them conjunctively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// `document.field == value`.
    Term { field: String, value: Value },
    /// Field is present and non-null.
    Exists(String),
    /// Field matches `text` under `match_type` semantics.
    Match {
        field: String,
        text: String,
        #[serde(rename = "type", default)]
        match_type: MatchType,
    },
}

impl Filter {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Filter::Exists(field.into())
    }

    pub fn match_phrase(field: impl Into<String>, text: impl Into<String>) -> Self {
        Filter::Match {
            field: field.into(),
            text: text.into(),
            match_type: MatchType::Phrase,
        }
    }

    pub fn match_text(field: impl Into<String>, text: impl Into<String>) -> Self {
        Filter::Match {
            field: field.into(),
            text: text.into(),
            match_type: MatchType::Boolean,
        }
    }

    /// The field this filter constrains.
    pub fn field(&self) -> &str {
        match self {
            Filter::Term { field, .. } | Filter::Match { field, .. } => field,
            Filter::Exists(field) => field,
        }
    }
}
