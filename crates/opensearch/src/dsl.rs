//! Translation of a [`SearchQuery`] into query DSL.
//!
//! Every clause goes into `bool.filter` (no scoring), after the range
//! filter on the time field:
//!
//! ```text
//! Term            -> {"term": {field: value}}
//! Exists          -> {"exists": {"field": field}}
//! Match(Phrase)   -> {"match_phrase": {field: text}}
//! Match(Boolean)  -> {"match": {field: {"query": text}}}
//! ```

use serde_json::{json, Map, Value};
use tripwire_rules::{Filter, MatchType, SearchQuery};

/// Full `_search` request body, newest hits first.
pub fn search_body(query: &SearchQuery) -> Value {
    let mut clauses = Vec::with_capacity(query.must().len() + 1);
    clauses.push(range_clause(query));
    clauses.extend(query.must().iter().map(filter_clause));

    json!({
        "size": query.size(),
        "sort": [{ query.time_field(): { "order": "desc" } }],
        "query": { "bool": { "filter": clauses } }
    })
}

fn range_clause(query: &SearchQuery) -> Value {
    let window = query.window();
    json!({
        "range": {
            query.time_field(): {
                "gte": window.start().to_rfc3339(),
                "lt": window.end().to_rfc3339(),
            }
        }
    })
}

fn filter_clause(filter: &Filter) -> Value {
    match filter {
        Filter::Term { field, value } => single("term", field, value.clone()),
        Filter::Exists(field) => json!({ "exists": { "field": field } }),
        Filter::Match {
            field,
            text,
            match_type: MatchType::Phrase,
        } => single("match_phrase", field, Value::String(text.clone())),
        Filter::Match {
            field,
            text,
            match_type: MatchType::Boolean,
        } => single("match", field, json!({ "query": text })),
    }
}

/// `{kind: {field: body}}` with a field name that may contain dots.
fn single(kind: &str, field: &str, body: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(field.to_string(), body);
    let mut outer = Map::new();
    outer.insert(kind.to_string(), Value::Object(inner));
    Value::Object(outer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tripwire_rules::TimeWindow;

    fn pinned() -> TimeWindow {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        TimeWindow::between(end - Duration::minutes(10), end).unwrap()
    }

    #[test]
    fn translates_every_filter_kind() {
        let query = SearchQuery::build(
            pinned(),
            vec![
                Filter::term("_type", "addons"),
                Filter::exists("details.sourceipaddress"),
                Filter::match_phrase("msg", "The password was incorrect"),
                Filter::match_text("summary", "ssl blacklist"),
            ],
        )
        .unwrap();

        let body = search_body(&query);
        let filter = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filter.len(), 5);
        assert_eq!(
            filter[0],
            json!({"range": {"utctimestamp": {
                "gte": "2024-03-01T11:50:00+00:00",
                "lt": "2024-03-01T12:00:00+00:00"
            }}})
        );
        assert_eq!(filter[1], json!({"term": {"_type": "addons"}}));
        assert_eq!(filter[2], json!({"exists": {"field": "details.sourceipaddress"}}));
        assert_eq!(
            filter[3],
            json!({"match_phrase": {"msg": "The password was incorrect"}})
        );
        assert_eq!(filter[4], json!({"match": {"summary": {"query": "ssl blacklist"}}}));
    }

    #[test]
    fn size_and_sort_follow_query() {
        let query = SearchQuery::build(pinned(), vec![])
            .unwrap()
            .with_time_field("receivedtimestamp")
            .with_size(50);

        let body = search_body(&query);
        assert_eq!(body["size"], 50);
        assert_eq!(body["sort"], json!([{"receivedtimestamp": {"order": "desc"}}]));
        assert!(body["query"]["bool"]["filter"][0]["range"]["receivedtimestamp"].is_object());
    }

    #[test]
    fn numeric_term_values_kept_typed() {
        let query = SearchQuery::build(pinned(), vec![Filter::term("details.port", 443)]).unwrap();
        let body = search_body(&query);
        assert_eq!(body["query"]["bool"]["filter"][1], json!({"term": {"details.port": 443}}));
    }
}
