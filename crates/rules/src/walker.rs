//! Threshold walker: applies the trigger policy and forwards alerts.
//!
//! Two modes, each exhaustive over its input:
//! - aggregated: one `on_aggregation` call per group with
//!   `total_count >= threshold`; smaller groups are skipped silently.
//! - per-event: one `on_event` call per document, unconditionally.
//!
//! A failing callback is logged and counted, and the walk moves on to the
//! next group or event.

use serde::Serialize;
use tracing::{debug, info, warn};
use tripwire_core::Document;

use crate::aggregator::AggregationGroup;
use crate::alert::AlertRecord;
use crate::error::CallbackError;
use crate::sink::AlertSink;

/// What an aggregated-mode callback sees for one group.
#[derive(Debug, Clone, Copy)]
pub struct Aggregation<'a> {
    /// True group size.
    pub count: usize,
    /// Shared value of the group-by field.
    pub value: &'a str,
    /// Bounded display sample (a prefix of `all_events`).
    pub events: &'a [Document],
    /// Every document in the group.
    pub all_events: &'a [Document],
}

impl<'a> From<&'a AggregationGroup> for Aggregation<'a> {
    fn from(group: &'a AggregationGroup) -> Self {
        Self {
            count: group.total_count(),
            value: group.value(),
            events: group.sample_events(),
            all_events: group.all_events(),
        }
    }
}

/// Rule-specific alert materialization.
///
/// Both methods default to declining, so a rule only implements the mode
/// it uses. Returning `Ok(None)` means "no alert".
pub trait AlertCallbacks: Send + Sync {
    fn on_aggregation(
        &self,
        _aggregation: &Aggregation<'_>,
    ) -> Result<Option<AlertRecord>, CallbackError> {
        Ok(None)
    }

    fn on_event(&self, _event: &Document) -> Result<Option<AlertRecord>, CallbackError> {
        Ok(None)
    }
}

/// Counters for one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Groups or events considered.
    pub evaluated: usize,
    /// Callbacks invoked.
    pub invoked: usize,
    pub alerts_emitted: usize,
    pub declined: usize,
    pub callback_failures: usize,
    pub sink_failures: usize,
}

/// Drives callbacks and hands produced alerts to the sink.
pub struct ThresholdWalker<'a> {
    rule_id: &'a str,
    sink: &'a dyn AlertSink,
}

impl<'a> ThresholdWalker<'a> {
    pub fn new(rule_id: &'a str, sink: &'a dyn AlertSink) -> Self {
        Self { rule_id, sink }
    }

    pub async fn walk_aggregations(
        &self,
        groups: &[AggregationGroup],
        threshold: usize,
        callbacks: &dyn AlertCallbacks,
    ) -> WalkStats {
        let mut stats = WalkStats::default();

        for group in groups {
            stats.evaluated += 1;
            if group.total_count() < threshold {
                debug!(
                    rule_id = %self.rule_id,
                    value = %group.value(),
                    count = group.total_count(),
                    threshold,
                    "group below threshold"
                );
                continue;
            }

            stats.invoked += 1;
            let outcome = callbacks.on_aggregation(&Aggregation::from(group));
            self.forward(outcome, group.value(), &mut stats).await;
        }

        info!(
            rule_id = %self.rule_id,
            groups = stats.evaluated,
            triggered = stats.invoked,
            alerts = stats.alerts_emitted,
            failures = stats.callback_failures,
            "aggregation walk complete"
        );
        stats
    }

    pub async fn walk_events(
        &self,
        events: &[Document],
        callbacks: &dyn AlertCallbacks,
    ) -> WalkStats {
        let mut stats = WalkStats::default();

        for event in events {
            stats.evaluated += 1;
            stats.invoked += 1;
            let outcome = callbacks.on_event(event);
            let label = event.id.as_deref().unwrap_or("<no id>");
            self.forward(outcome, label, &mut stats).await;
        }

        info!(
            rule_id = %self.rule_id,
            events = stats.evaluated,
            alerts = stats.alerts_emitted,
            failures = stats.callback_failures,
            "event walk complete"
        );
        stats
    }

    async fn forward(
        &self,
        outcome: Result<Option<AlertRecord>, CallbackError>,
        subject: &str,
        stats: &mut WalkStats,
    ) {
        match outcome {
            Ok(Some(alert)) => match self.sink.emit(self.rule_id, &alert).await {
                Ok(()) => {
                    stats.alerts_emitted += 1;
                    info!(
                        rule_id = %self.rule_id,
                        alert_id = %alert.id(),
                        severity = %alert.severity(),
                        summary = %alert.summary(),
                        "alert emitted"
                    );
                }
                Err(e) => {
                    stats.sink_failures += 1;
                    warn!(
                        rule_id = %self.rule_id,
                        sink = self.sink.sink_name(),
                        error = %e,
                        "failed to hand alert to sink"
                    );
                }
            },
            Ok(None) => {
                stats.declined += 1;
                debug!(rule_id = %self.rule_id, subject, "callback declined to alert");
            }
            Err(e) => {
                stats.callback_failures += 1;
                warn!(rule_id = %self.rule_id, subject, error = %e, "rule callback failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crate::alert::{create_alert_dict, Severity};
    use crate::sink::{MemorySink, SinkError};
    use serde_json::json;

    fn users(counts: &[(&str, usize)]) -> Vec<Document> {
        counts
            .iter()
            .flat_map(|(user, n)| {
                (0..*n).map(move |i| Document::new(json!({"suser": user, "i": i})))
            })
            .collect()
    }

    struct CountingRule;

    impl AlertCallbacks for CountingRule {
        fn on_aggregation(
            &self,
            aggregation: &Aggregation<'_>,
        ) -> Result<Option<AlertRecord>, CallbackError> {
            let alert = create_alert_dict(
                format!("{} hits: {}", aggregation.count, aggregation.value),
                "test",
                ["test"],
                aggregation.events.to_vec(),
                Severity::Notice,
            )?;
            Ok(Some(alert))
        }

        fn on_event(&self, event: &Document) -> Result<Option<AlertRecord>, CallbackError> {
            let user = event
                .get_text("suser")
                .ok_or_else(|| CallbackError::MissingField("suser".to_string()))?;
            if user == "skip" {
                return Ok(None);
            }
            Ok(Some(create_alert_dict(
                user,
                "test",
                ["test"],
                vec![event.clone()],
                Severity::Info,
            )?))
        }
    }

    fn groups(counts: &[(&str, usize)]) -> Vec<AggregationGroup> {
        Aggregator::new("suser", 15).unwrap().aggregate(users(counts))
    }

    #[tokio::test]
    async fn threshold_is_inclusive() {
        let sink = MemorySink::new();
        let walker = ThresholdWalker::new("r", &sink);

        let stats = walker
            .walk_aggregations(&groups(&[("at", 20), ("below", 19)]), 20, &CountingRule)
            .await;

        assert_eq!(stats.evaluated, 2);
        assert_eq!(stats.invoked, 1);
        assert_eq!(stats.alerts_emitted, 1);
        let alerts = sink.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].1.summary(), "20 hits: at");
    }

    #[tokio::test]
    async fn callbacks_see_sample_and_full_buffers() {
        struct Inspect;
        impl AlertCallbacks for Inspect {
            fn on_aggregation(
                &self,
                aggregation: &Aggregation<'_>,
            ) -> Result<Option<AlertRecord>, CallbackError> {
                assert_eq!(aggregation.count, 30);
                assert_eq!(aggregation.events.len(), 15);
                assert_eq!(aggregation.all_events.len(), 30);
                Ok(None)
            }
        }

        let sink = MemorySink::new();
        let stats = ThresholdWalker::new("r", &sink)
            .walk_aggregations(&groups(&[("a", 30)]), 1, &Inspect)
            .await;
        assert_eq!(stats.declined, 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn failing_callback_does_not_stop_walk() {
        let sink = MemorySink::new();
        let mut events = users(&[("ok1", 1)]);
        events.push(Document::new(json!({"other": 1})));
        events.extend(users(&[("skip", 1), ("ok2", 1)]));

        let stats = ThresholdWalker::new("r", &sink)
            .walk_events(&events, &CountingRule)
            .await;

        assert_eq!(stats.evaluated, 4);
        assert_eq!(stats.callback_failures, 1);
        assert_eq!(stats.declined, 1);
        assert_eq!(stats.alerts_emitted, 2);
        let summaries: Vec<String> = sink
            .alerts()
            .iter()
            .map(|(_, a)| a.summary().to_string())
            .collect();
        assert_eq!(summaries, vec!["ok1", "ok2"]);
    }

    #[tokio::test]
    async fn failing_group_does_not_block_later_groups() {
        struct RejectsBad;
        impl AlertCallbacks for RejectsBad {
            fn on_aggregation(
                &self,
                aggregation: &Aggregation<'_>,
            ) -> Result<Option<AlertRecord>, CallbackError> {
                if aggregation.value == "bad" {
                    return Err(CallbackError::MissingField("details.sourceipaddress".into()));
                }
                CountingRule.on_aggregation(aggregation)
            }
        }

        let sink = MemorySink::new();
        let stats = ThresholdWalker::new("r", &sink)
            .walk_aggregations(&groups(&[("first", 3), ("bad", 3), ("last", 3)]), 2, &RejectsBad)
            .await;

        assert_eq!(stats.invoked, 3);
        assert_eq!(stats.callback_failures, 1);
        assert_eq!(stats.alerts_emitted, 2);
        let summaries: Vec<String> = sink
            .alerts()
            .iter()
            .map(|(_, a)| a.summary().to_string())
            .collect();
        assert_eq!(summaries, vec!["3 hits: first", "3 hits: last"]);
    }

    #[tokio::test]
    async fn sink_failure_is_counted_and_walk_continues() {
        struct BrokenSink;

        #[async_trait::async_trait]
        impl AlertSink for BrokenSink {
            async fn emit(&self, _rule_id: &str, _alert: &AlertRecord) -> Result<(), SinkError> {
                Err(SinkError::Unavailable("down".to_string()))
            }

            fn sink_name(&self) -> &str {
                "broken"
            }
        }

        let stats = ThresholdWalker::new("r", &BrokenSink)
            .walk_aggregations(&groups(&[("a", 2), ("b", 2)]), 1, &CountingRule)
            .await;
        assert_eq!(stats.invoked, 2);
        assert_eq!(stats.sink_failures, 2);
        assert_eq!(stats.alerts_emitted, 0);
    }
}
