//! Alert sinks: where finished alerts are handed off.
//!
//! Each emitted alert is committed independently. A failure on one alert
//! does not roll back alerts already emitted in the same run.

use std::io::Write;
use std::sync::Mutex;

use serde::Serialize;

use crate::alert::AlertRecord;

/// Errors that can occur while handing an alert to a sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize alert: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for alert records.
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    async fn emit(&self, rule_id: &str, alert: &AlertRecord) -> Result<(), SinkError>;

    /// Human-readable name for this sink (e.g., "jsonl", "memory").
    fn sink_name(&self) -> &str;
}

#[derive(Serialize)]
struct Envelope<'a> {
    rule_id: &'a str,
    #[serde(flatten)]
    alert: &'a AlertRecord,
}

/// Writes one JSON object per alert, newline-delimited.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the sink and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> AlertSink for JsonLinesSink<W> {
    async fn emit(&self, rule_id: &str, alert: &AlertRecord) -> Result<(), SinkError> {
        let line = serde_json::to_string(&Envelope { rule_id, alert })?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Unavailable("writer lock poisoned".to_string()))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "jsonl"
    }
}

/// Collects alerts in memory, keyed by the emitting rule.
#[derive(Debug, Default)]
pub struct MemorySink {
    alerts: Mutex<Vec<(String, AlertRecord)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn alerts(&self) -> Vec<(String, AlertRecord)> {
        self.alerts
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().map(|alerts| alerts.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl AlertSink for MemorySink {
    async fn emit(&self, rule_id: &str, alert: &AlertRecord) -> Result<(), SinkError> {
        self.alerts
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink lock poisoned".to_string()))?
            .push((rule_id.to_string(), alert.clone()));
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "memory"
    }
}
