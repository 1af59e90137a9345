//! Backend that prints the query instead of sending it.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tripwire_core::Document;
use tripwire_opensearch::search_body;
use tripwire_rules::{SearchBackend, SearchBackendError, SearchQuery};

/// Writes each request as one JSON line and returns no hits.
pub struct DryRunBackend<W: Write + Send> {
    index: String,
    out: Mutex<W>,
}

impl DryRunBackend<std::io::Stdout> {
    pub fn stdout(index: impl Into<String>) -> Self {
        Self::new(index, std::io::stdout())
    }
}

impl<W: Write + Send> DryRunBackend<W> {
    pub fn new(index: impl Into<String>, out: W) -> Self {
        Self {
            index: index.into(),
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> SearchBackend for DryRunBackend<W> {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Document>, SearchBackendError> {
        let line = json!({
            "dry_run": true,
            "index": self.index,
            "body": search_body(query),
        });
        let mut out = self
            .out
            .lock()
            .map_err(|_| SearchBackendError::Unavailable("dry-run output lock poisoned".into()))?;
        writeln!(out, "{}", line).map_err(|e| SearchBackendError::Unavailable(e.to_string()))?;
        Ok(Vec::new())
    }

    fn backend_name(&self) -> &str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripwire_rules::Filter;

    #[tokio::test]
    async fn prints_body_and_returns_nothing() {
        let backend = DryRunBackend::new("events", Vec::new());
        let query = SearchQuery::build(
            chrono::Duration::minutes(10),
            vec![Filter::term("category", "brointel")],
        )
        .unwrap();

        let hits = backend.search(&query).await.unwrap();
        assert!(hits.is_empty());

        let output = String::from_utf8(backend.into_inner()).unwrap();
        let line: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(line["index"], "events");
        assert_eq!(
            line["body"]["query"]["bool"]["filter"][1],
            json!({"term": {"category": "brointel"}})
        );
    }
}
