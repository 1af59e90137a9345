//! Search backend abstraction.
//!
//! The engine only depends on [`SearchBackend`]; the OpenSearch adapter
//! lives in its own crate and is injected at startup. Implementations must
//! be safe for concurrent use by several rule executions.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tripwire_core::Document;

use crate::query::{Filter, MatchType, SearchQuery};

/// Errors surfaced by a backend call. Always fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum SearchBackendError {
    #[error("search timed out after {0}ms")]
    Timeout(u64),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode search response: {0}")]
    Decode(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Executes a [`SearchQuery`] and returns matching documents.
///
/// Retries, pagination and authentication are the implementation's concern.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Document>, SearchBackendError>;

    /// Short label for logs (e.g. `"opensearch"`).
    fn backend_name(&self) -> &str;
}

/// Backend over a fixed in-memory document set.
///
/// Evaluates filters and the time window locally. Documents whose time
/// field is missing or unparseable never match, mirroring a range filter.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    documents: Vec<Document>,
}

impl MemoryBackend {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

#[async_trait::async_trait]
impl SearchBackend for MemoryBackend {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Document>, SearchBackendError> {
        let mut hits: Vec<(DateTime<Utc>, &Document)> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let at = doc.get(query.time_field()).and_then(parse_timestamp)?;
                let hit = query.window().contains(at)
                    && query.must().iter().all(|f| filter_matches(f, doc));
                hit.then_some((at, doc))
            })
            .collect();

        // Newest first, stable for equal timestamps.
        hits.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(hits
            .into_iter()
            .take(query.size())
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn filter_matches(filter: &Filter, doc: &Document) -> bool {
    match filter {
        Filter::Term { field, value } => doc.get(field).is_some_and(|v| term_equals(v, value)),
        Filter::Exists(field) => doc.has(field),
        Filter::Match {
            field,
            text,
            match_type,
        } => {
            let Some(haystack) = doc.get(field).and_then(Value::as_str) else {
                return false;
            };
            let haystack = haystack.to_lowercase();
            match match_type {
                MatchType::Phrase => haystack.contains(&text.to_lowercase()),
                MatchType::Boolean => {
                    let tokens: Vec<&str> = haystack.split_whitespace().collect();
                    text.to_lowercase()
                        .split_whitespace()
                        .any(|term| tokens.contains(&term))
                }
            }
        }
    }
}

/// Exact equality; arrays match when any element equals the term.
fn term_equals(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| item == expected),
        other => other == expected,
    }
}
