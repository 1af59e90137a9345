//! Per-run execution context and the rule entry point.
//!
//! An [`AlertTask`] is created fresh for every execution and threaded
//! through the stages a rule's `main` drives:
//!
//! ```text
//! filters_manual -> search_events_{aggregated,simple} -> walk_{aggregations,events}
//! ```
//!
//! Nothing in the task outlives the run, so consecutive runs never share
//! queries or aggregation state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use tripwire_core::config::EngineConfig;
use tripwire_core::Document;

use crate::aggregator::{AggregationGroup, Aggregator};
use crate::backend::{SearchBackend, SearchBackendError};
use crate::error::{ConfigurationError, EngineError};
use crate::query::{Filter, SearchQuery, TimeWindow, WindowSpec};
use crate::sink::AlertSink;
use crate::walker::{AlertCallbacks, ThresholdWalker, WalkStats};

/// Engine-wide defaults applied to every run.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Samples kept per group when a rule passes none.
    pub samples_limit: usize,
    pub search_size: usize,
    pub time_field: String,
    /// Deadline for the backend call.
    pub deadline: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            samples_limit: config.samples_limit,
            search_size: config.search_size,
            time_field: config.time_field.clone(),
            deadline: Duration::from_millis(config.deadline_ms),
        }
    }
}

/// Summary of one rule execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub rule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,
    pub documents_fetched: usize,
    pub groups: usize,
    pub walk: WalkStats,
    pub duration_ms: u64,
}

/// An alerting scenario: configuration in `main`, alert content in the
/// [`AlertCallbacks`] methods.
#[async_trait::async_trait]
pub trait AlertRule: AlertCallbacks {
    /// Stable identifier used in logs and sink records.
    fn id(&self) -> &str;

    /// Whether the rule should run at all.
    fn enabled(&self) -> bool {
        true
    }

    /// Configure and drive one execution.
    async fn main(&self, task: &mut AlertTask<'_>) -> Result<(), EngineError>;
}

enum SearchResults {
    Events(Vec<Document>),
    Aggregated(Vec<AggregationGroup>),
}

/// Execution context for a single rule run.
pub struct AlertTask<'a> {
    rule_id: &'a str,
    backend: &'a dyn SearchBackend,
    sink: &'a dyn AlertSink,
    settings: &'a EngineSettings,
    now: DateTime<Utc>,
    query: Option<SearchQuery>,
    results: Option<SearchResults>,
    report: RunReport,
}

impl<'a> AlertTask<'a> {
    pub fn new(
        rule_id: &'a str,
        backend: &'a dyn SearchBackend,
        sink: &'a dyn AlertSink,
        settings: &'a EngineSettings,
    ) -> Self {
        Self::new_at(rule_id, backend, sink, settings, Utc::now())
    }

    /// Like [`new`](Self::new) but with a fixed notion of "now".
    pub fn new_at(
        rule_id: &'a str,
        backend: &'a dyn SearchBackend,
        sink: &'a dyn AlertSink,
        settings: &'a EngineSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            rule_id,
            backend,
            sink,
            settings,
            now,
            query: None,
            results: None,
            report: RunReport {
                rule_id: rule_id.to_string(),
                ..RunReport::default()
            },
        }
    }

    pub fn rule_id(&self) -> &str {
        self.rule_id
    }

    pub fn settings(&self) -> &EngineSettings {
        self.settings
    }

    /// Build (without binding) a query carrying engine defaults for the
    /// time field and result size, resolved against this run's clock.
    pub fn build_query(
        &self,
        window: impl Into<WindowSpec>,
        must: Vec<Filter>,
    ) -> Result<SearchQuery, EngineError> {
        Ok(SearchQuery::build_at(window, must, self.now)?
            .with_time_field(self.settings.time_field.clone())
            .with_size(self.settings.search_size))
    }

    /// Bind a query from a window and must-filters.
    pub fn filters_manual(
        &mut self,
        window: impl Into<WindowSpec>,
        must: Vec<Filter>,
    ) -> Result<&SearchQuery, EngineError> {
        let query = self.build_query(window, must)?;
        Ok(self.bind_query(query))
    }

    /// Bind a query the rule built itself.
    pub fn bind_query(&mut self, query: SearchQuery) -> &SearchQuery {
        self.report.window = Some(*query.window());
        self.results = None;
        self.query.insert(query)
    }

    pub fn query(&self) -> Option<&SearchQuery> {
        self.query.as_ref()
    }

    /// Execute the bound query and keep the flat result list.
    ///
    /// Returns the number of documents fetched.
    pub async fn search_events_simple(&mut self) -> Result<usize, EngineError> {
        let documents = self.execute().await?;
        let n = documents.len();
        self.results = Some(SearchResults::Events(documents));
        Ok(n)
    }

    /// Execute the bound query and group results by `field`.
    ///
    /// `samples_limit` falls back to the engine default. Returns the number
    /// of groups.
    pub async fn search_events_aggregated(
        &mut self,
        field: &str,
        samples_limit: Option<usize>,
    ) -> Result<usize, EngineError> {
        let aggregator =
            Aggregator::new(field, samples_limit.unwrap_or(self.settings.samples_limit))?;
        let documents = self.execute().await?;
        let groups = aggregator.aggregate(documents);
        let n = groups.len();
        self.report.groups = n;
        self.results = Some(SearchResults::Aggregated(groups));
        Ok(n)
    }

    /// Invoke `on_aggregation` for every group with at least `threshold` events.
    pub async fn walk_aggregations(
        &mut self,
        threshold: usize,
        callbacks: &dyn AlertCallbacks,
    ) -> Result<&WalkStats, EngineError> {
        let groups = match self.results.take() {
            Some(SearchResults::Aggregated(groups)) => groups,
            Some(SearchResults::Events(_)) => {
                return Err(ConfigurationError::new(
                    "walk_aggregations requires search_events_aggregated",
                )
                .into())
            }
            None => return Err(ConfigurationError::new("walk_aggregations before any search").into()),
        };

        let walker = ThresholdWalker::new(self.rule_id, self.sink);
        self.report.walk = walker.walk_aggregations(&groups, threshold, callbacks).await;
        Ok(&self.report.walk)
    }

    /// Invoke `on_event` once per fetched document.
    pub async fn walk_events(
        &mut self,
        callbacks: &dyn AlertCallbacks,
    ) -> Result<&WalkStats, EngineError> {
        let events = match self.results.take() {
            Some(SearchResults::Events(events)) => events,
            Some(SearchResults::Aggregated(_)) => {
                return Err(
                    ConfigurationError::new("walk_events requires search_events_simple").into(),
                )
            }
            None => return Err(ConfigurationError::new("walk_events before any search").into()),
        };

        let walker = ThresholdWalker::new(self.rule_id, self.sink);
        self.report.walk = walker.walk_events(&events, callbacks).await;
        Ok(&self.report.walk)
    }

    /// Finish the run and return its report.
    pub fn into_report(self) -> RunReport {
        self.report
    }

    async fn execute(&mut self) -> Result<Vec<Document>, EngineError> {
        let query = self
            .query
            .as_ref()
            .ok_or_else(|| ConfigurationError::new("search before filters_manual"))?;

        let deadline = self.settings.deadline;
        let documents = match tokio::time::timeout(deadline, self.backend.search(query)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SearchBackendError::Timeout(deadline.as_millis() as u64).into());
            }
        };

        info!(
            rule_id = %self.rule_id,
            backend = self.backend.backend_name(),
            window = %query.window(),
            filters = query.must().len(),
            hits = documents.len(),
            "search complete"
        );
        self.report.documents_fetched = documents.len();
        Ok(documents)
    }
}

/// Runs rules against a shared backend and sink.
///
/// The engine holds no per-run state; concurrent `run` calls each get
/// their own [`AlertTask`].
pub struct Engine {
    backend: Arc<dyn SearchBackend>,
    sink: Arc<dyn AlertSink>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        sink: Arc<dyn AlertSink>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            backend,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Execute one rule once.
    ///
    /// Configuration and backend errors end the run; alerts already handed
    /// to the sink stay emitted.
    pub async fn run(&self, rule: &dyn AlertRule) -> Result<RunReport, EngineError> {
        let started = Instant::now();
        let mut task = AlertTask::new(rule.id(), &*self.backend, &*self.sink, &self.settings);

        if let Err(e) = rule.main(&mut task).await {
            error!(rule_id = %rule.id(), error = %e, "rule run failed");
            return Err(e);
        }

        let mut report = task.into_report();
        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            rule_id = %report.rule_id,
            fetched = report.documents_fetched,
            alerts = report.walk.alerts_emitted,
            callback_failures = report.walk.callback_failures,
            duration_ms = report.duration_ms,
            "rule run complete"
        );
        Ok(report)
    }
}
