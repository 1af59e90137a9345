//! Group documents by a field value.
//!
//! Each group keeps every matching document in arrival order. The display
//! sample is always a prefix of that sequence, so secondary statistics such
//! as [`most_common`](crate::ranker::most_common) run over the full group
//! while summaries only carry the bounded sample.

use indexmap::IndexMap;
use tripwire_core::Document;

use crate::error::ConfigurationError;

/// Documents sharing one value of the group-by field within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationGroup {
    value: String,
    all_events: Vec<Document>,
    samples_limit: usize,
}

impl AggregationGroup {
    /// The shared field value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// True group size, equal to `all_events().len()`.
    pub fn total_count(&self) -> usize {
        self.all_events.len()
    }

    /// The first `min(samples_limit, total_count)` documents.
    pub fn sample_events(&self) -> &[Document] {
        let n = self.samples_limit.min(self.all_events.len());
        &self.all_events[..n]
    }

    /// Every document in the group, never truncated.
    pub fn all_events(&self) -> &[Document] {
        &self.all_events
    }
}

/// Groups raw results by `field`, keeping `samples_limit` samples per group.
#[derive(Debug, Clone)]
pub struct Aggregator {
    field: String,
    samples_limit: usize,
}

impl Aggregator {
    pub fn new(field: impl Into<String>, samples_limit: usize) -> Result<Self, ConfigurationError> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(ConfigurationError::new("aggregation field must not be empty"));
        }
        if samples_limit == 0 {
            return Err(ConfigurationError::new("samples_limit must be at least 1"));
        }
        Ok(Self {
            field,
            samples_limit,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn samples_limit(&self) -> usize {
        self.samples_limit
    }

    /// Stream `documents` into groups ordered by first appearance.
    ///
    /// Documents without the field are dropped and count toward no group.
    pub fn aggregate(&self, documents: Vec<Document>) -> Vec<AggregationGroup> {
        let mut groups: IndexMap<String, Vec<Document>> = IndexMap::new();

        for doc in documents {
            let Some(value) = doc.get_text(&self.field) else {
                continue;
            };
            groups.entry(value).or_default().push(doc);
        }

        groups
            .into_iter()
            .map(|(value, all_events)| AggregationGroup {
                value,
                all_events,
                samples_limit: self.samples_limit,
            })
            .collect()
    }
}
