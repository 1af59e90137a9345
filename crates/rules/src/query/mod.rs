//! Filter model and search query builder.
//!
//! A [`SearchQuery`] owns one [`TimeWindow`] and an ordered list of
//! [`Filter`]s applied conjunctively. Queries are built once per rule
//! execution and never reused across runs.

mod filter;
mod window;

pub use filter::*;
pub use window::*;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ConfigurationError;

/// Default timestamp field the window is applied to.
pub const DEFAULT_TIME_FIELD: &str = "utctimestamp";

/// Default cap on documents returned for one execution.
pub const DEFAULT_SEARCH_SIZE: usize = 1000;

/// An executable query: a bound time window plus must-filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    window: TimeWindow,
    must: Vec<Filter>,
    time_field: String,
    size: usize,
}

impl SearchQuery {
    /// Bind `must` filters to a window resolved against the current time.
    pub fn build(window: impl Into<WindowSpec>, must: Vec<Filter>) -> Result<Self, ConfigurationError> {
        Self::build_at(window, must, Utc::now())
    }

    /// Bind `must` filters to a window resolved against `now`.
    pub fn build_at(
        window: impl Into<WindowSpec>,
        must: Vec<Filter>,
        now: DateTime<Utc>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            window: window.into().resolve(now)?,
            must,
            time_field: DEFAULT_TIME_FIELD.to_string(),
            size: DEFAULT_SEARCH_SIZE,
        })
    }

    pub fn with_time_field(mut self, field: impl Into<String>) -> Self {
        self.time_field = field.into();
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Append further must-filters.
    pub fn add_must(&mut self, filters: impl IntoIterator<Item = Filter>) {
        self.must.extend(filters);
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    pub fn must(&self) -> &[Filter] {
        &self.must
    }

    pub fn time_field(&self) -> &str {
        &self.time_field
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn build_binds_window_and_filters() {
        let now = Utc::now();
        let query = SearchQuery::build_at(
            Duration::minutes(10),
            vec![Filter::term("_type", "addons"), Filter::exists("suser")],
            now,
        )
        .unwrap()
        .with_time_field("@timestamp")
        .with_size(50);

        assert_eq!(query.window().end(), now);
        assert_eq!(query.must().len(), 2);
        assert_eq!(query.time_field(), "@timestamp");
        assert_eq!(query.size(), 50);
    }

    #[test]
    fn add_must_preserves_order() {
        let mut query = SearchQuery::build(Duration::minutes(15), vec![Filter::term("a", "1")]).unwrap();
        query.add_must([Filter::exists("b"), Filter::exists("c")]);
        let fields: Vec<&str> = query.must().iter().map(Filter::field).collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn zero_duration_fails() {
        let err = SearchQuery::build(Duration::zero(), vec![]).unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn identical_pinned_inputs_build_identical_queries() {
        let now = Utc::now();
        let window = TimeWindow::between(now - Duration::minutes(5), now).unwrap();
        let filters = vec![Filter::term("category", "brointel")];
        let a = SearchQuery::build(window, filters.clone()).unwrap();
        let b = SearchQuery::build(window, filters).unwrap();
        assert_eq!(a, b);
    }
}
