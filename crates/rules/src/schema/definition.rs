//! The `AlertRule` document.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::alert::Severity;
use crate::error::ConfigurationError;
use crate::query::{Filter, TimeWindow};
use crate::templates::SummaryRenderer;

use super::{parse_window, CommonMetadata};

/// Only supported `apiVersion`.
pub const API_VERSION: &str = "v1";

/// Only supported `kind`.
pub const RULE_KIND: &str = "AlertRule";

/// Header fields read before the full document is deserialized.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEnvelope {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
}

/// A declarative alert rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuleDefinition {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    pub search: SearchSpec,
    /// Absent means per-event mode.
    #[serde(default)]
    pub aggregate: Option<AggregateSpec>,
    pub alert: AlertSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SearchSpec {
    /// Lookback, e.g. `"10m"`.
    pub window: String,
    #[serde(default)]
    pub time_field: Option<String>,
    #[serde(default)]
    pub size: Option<usize>,
    /// Each entry is a single-key map such as `term: {..}` or `exists: f`.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub must: Vec<Filter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AggregateSpec {
    pub field: String,
    #[serde(default)]
    pub samples_limit: Option<usize>,
    pub threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AlertSpec {
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub url: Option<String>,
    /// Minijinja template.
    pub summary: String,
    #[serde(default)]
    pub most_common: Option<MostCommonSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MostCommonSpec {
    pub field: String,
    #[serde(default = "default_most_common_limit")]
    pub limit: usize,
}

fn default_severity() -> Severity {
    Severity::Notice
}

fn default_most_common_limit() -> usize {
    5
}

impl RuleDefinition {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Parsed lookback window.
    pub fn window(&self) -> Result<Duration, ConfigurationError> {
        let duration = parse_window(&self.search.window).ok_or_else(|| {
            ConfigurationError::new(format!("invalid search.window '{}'", self.search.window))
        })?;
        if duration <= Duration::zero() {
            return Err(ConfigurationError::new(format!(
                "search.window '{}' must be positive",
                self.search.window
            )));
        }
        TimeWindow::last(duration)?;
        Ok(duration)
    }

    /// Check everything that can be checked without running the rule.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.api_version != API_VERSION {
            return Err(ConfigurationError::new(format!(
                "unsupported apiVersion '{}'",
                self.api_version
            )));
        }
        if self.kind != RULE_KIND {
            return Err(ConfigurationError::new(format!("unsupported kind '{}'", self.kind)));
        }
        if self.metadata.id.trim().is_empty() {
            return Err(ConfigurationError::new("metadata.id must not be empty"));
        }

        self.window()?;
        if self.search.size == Some(0) {
            return Err(ConfigurationError::new("search.size must be positive"));
        }
        if let Some(filter) = self.search.must.iter().find(|f| f.field().is_empty()) {
            return Err(ConfigurationError::new(format!("filter with empty field: {:?}", filter)));
        }

        if let Some(aggregate) = &self.aggregate {
            if aggregate.field.trim().is_empty() {
                return Err(ConfigurationError::new("aggregate.field must not be empty"));
            }
            if aggregate.threshold == 0 {
                return Err(ConfigurationError::new("aggregate.threshold must be positive"));
            }
            if aggregate.samples_limit == Some(0) {
                return Err(ConfigurationError::new("aggregate.samples_limit must be positive"));
            }
        }

        if self.alert.category.trim().is_empty() {
            return Err(ConfigurationError::new("alert.category must not be empty"));
        }
        if let Some(most_common) = &self.alert.most_common {
            if most_common.field.trim().is_empty() {
                return Err(ConfigurationError::new("alert.most_common.field must not be empty"));
            }
            if most_common.limit == 0 {
                return Err(ConfigurationError::new("alert.most_common.limit must be positive"));
            }
        }
        SummaryRenderer::new().validate(&self.alert.summary)
    }
}
