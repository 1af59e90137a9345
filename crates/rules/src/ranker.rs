//! Frequency ranking ("most common") over a document field.

use indexmap::IndexMap;
use serde::Serialize;
use tripwire_core::Document;

/// One entry of a ranked frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedValue {
    pub value: String,
    pub count: usize,
}

/// Count each distinct value of `path` across `documents`.
///
/// Output is sorted by count descending; equal counts keep the order in
/// which values first appeared. Documents without the field are skipped.
/// The full ranking is returned, truncation is left to the caller.
pub fn most_common(documents: &[Document], path: &str) -> Vec<RankedValue> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for doc in documents {
        if let Some(value) = doc.get_text(path) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<RankedValue> = counts
        .into_iter()
        .map(|(value, count)| RankedValue { value, count })
        .collect();
    // `sort_by` is stable, so first-seen order breaks ties.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}
