//! Rule-driven alert engine.
//!
//! This crate provides:
//! - Filter model and time-windowed search queries
//! - The [`SearchBackend`](backend::SearchBackend) seam and an in-memory backend
//! - Grouping by field with bounded samples, threshold walking, frequency ranking
//! - Alert records and sinks
//! - YAML rule documents with a filesystem loader

pub mod aggregator;
pub mod alert;
pub mod backend;
pub mod declarative;
pub mod error;
pub mod loader;
pub mod query;
pub mod ranker;
pub mod schema;
pub mod sink;
pub mod task;
pub mod templates;
pub mod walker;

pub use aggregator::{AggregationGroup, Aggregator};
pub use alert::{create_alert_dict, AlertBuilder, AlertRecord, Severity};
pub use backend::{MemoryBackend, SearchBackend, SearchBackendError};
pub use declarative::DeclarativeRule;
pub use error::{CallbackError, ConfigurationError, EngineError};
pub use loader::{LoadResult, LoadStatus, RuleError, RuleLoader};
pub use query::{Filter, MatchType, SearchQuery, TimeWindow, WindowSpec};
pub use ranker::{most_common, RankedValue};
pub use sink::{AlertSink, JsonLinesSink, MemorySink, SinkError};
pub use task::{AlertRule, AlertTask, Engine, EngineSettings, RunReport};
pub use walker::{AlertCallbacks, Aggregation, ThresholdWalker, WalkStats};
