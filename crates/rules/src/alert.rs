//! Alert records and their builder.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tripwire_core::Document;
use uuid::Uuid;

use crate::error::ConfigurationError;

/// Alert severity, syslog-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "NOTICE" => Ok(Severity::Notice),
            "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" => Ok(Severity::Critical),
            "ALERT" => Ok(Severity::Alert),
            "EMERGENCY" => Ok(Severity::Emergency),
            other => Err(ConfigurationError::new(format!("unknown severity: '{}'", other))),
        }
    }
}

/// A finished alert, handed to the sink as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    id: Uuid,
    utctimestamp: DateTime<Utc>,
    summary: String,
    category: String,
    tags: IndexSet<String>,
    severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    events: Vec<Document>,
}

impl AlertRecord {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn utctimestamp(&self) -> DateTime<Utc> {
        self.utctimestamp
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn tags(&self) -> &IndexSet<String> {
        &self.tags
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn events(&self) -> &[Document] {
        &self.events
    }
}

/// Assembles an [`AlertRecord`]. Defaults to `NOTICE` severity.
#[derive(Debug, Clone)]
pub struct AlertBuilder {
    summary: String,
    category: String,
    tags: IndexSet<String>,
    severity: Severity,
    url: Option<String>,
    events: Vec<Document>,
}

impl AlertBuilder {
    pub fn new(summary: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            category: category.into(),
            tags: IndexSet::new(),
            severity: Severity::Notice,
            url: None,
            events: Vec::new(),
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn events(mut self, events: impl IntoIterator<Item = Document>) -> Self {
        self.events.extend(events);
        self
    }

    /// Finish the record. An alert without source events is rejected.
    pub fn build(self) -> Result<AlertRecord, ConfigurationError> {
        if self.events.is_empty() {
            return Err(ConfigurationError::new(format!(
                "alert '{}' has no source events",
                self.summary
            )));
        }
        Ok(AlertRecord {
            id: Uuid::new_v4(),
            utctimestamp: Utc::now(),
            summary: self.summary,
            category: self.category,
            tags: self.tags,
            severity: self.severity,
            url: self.url,
            events: self.events,
        })
    }
}

/// Build an alert from the pieces a rule callback computed.
pub fn create_alert_dict<I, S>(
    summary: impl Into<String>,
    category: impl Into<String>,
    tags: I,
    events: Vec<Document>,
    severity: Severity,
) -> Result<AlertRecord, ConfigurationError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    AlertBuilder::new(summary, category)
        .tags(tags)
        .events(events)
        .severity(severity)
        .build()
}
