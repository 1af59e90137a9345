//! Rules authored as YAML documents.
//!
//! [`DeclarativeRule`] is an ordinary [`AlertRule`]: `main` builds the query
//! from the `search` block and picks aggregated or per-event mode from the
//! presence of `aggregate`; the callbacks render the summary template.

use chrono::Duration;
use serde::Serialize;
use serde_json::Value;
use tripwire_core::Document;

use crate::alert::{AlertBuilder, AlertRecord};
use crate::error::{CallbackError, ConfigurationError, EngineError};
use crate::ranker::{most_common, RankedValue};
use crate::schema::RuleDefinition;
use crate::task::{AlertRule, AlertTask};
use crate::templates::SummaryRenderer;
use crate::walker::{AlertCallbacks, Aggregation};

#[derive(Serialize)]
struct RuleContext<'a> {
    id: &'a str,
    name: &'a str,
}

/// Variables visible to a summary template.
#[derive(Serialize)]
struct SummaryContext<'a> {
    rule: RuleContext<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<&'a Value>,
    top: Vec<RankedValue>,
}

/// A validated [`RuleDefinition`] ready to run.
#[derive(Debug)]
pub struct DeclarativeRule {
    definition: RuleDefinition,
    window: Duration,
    renderer: SummaryRenderer,
}

impl DeclarativeRule {
    pub fn new(definition: RuleDefinition) -> Result<Self, ConfigurationError> {
        definition.validate()?;
        let window = definition.window()?;
        Ok(Self {
            definition,
            window,
            renderer: SummaryRenderer::new(),
        })
    }

    pub fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.metadata.name
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn top(&self, events: &[Document]) -> Vec<RankedValue> {
        match &self.definition.alert.most_common {
            Some(spec) => {
                let mut ranked = most_common(events, &spec.field);
                ranked.truncate(spec.limit);
                ranked
            }
            None => Vec::new(),
        }
    }

    fn context<'a>(&'a self, top: Vec<RankedValue>) -> SummaryContext<'a> {
        SummaryContext {
            rule: RuleContext {
                id: self.id(),
                name: self.name(),
            },
            count: None,
            value: None,
            event: None,
            top,
        }
    }

    fn build_alert(
        &self,
        ctx: &SummaryContext<'_>,
        events: Vec<Document>,
    ) -> Result<AlertRecord, CallbackError> {
        let spec = &self.definition.alert;
        let summary = self
            .renderer
            .render(&spec.summary, ctx)
            .map_err(CallbackError::Template)?;

        let mut builder = AlertBuilder::new(summary, spec.category.clone())
            .tags(spec.tags.iter().cloned())
            .severity(spec.severity)
            .events(events);
        if let Some(url) = &spec.url {
            builder = builder.url(url.clone());
        }
        Ok(builder.build()?)
    }
}

impl AlertCallbacks for DeclarativeRule {
    fn on_aggregation(
        &self,
        aggregation: &Aggregation<'_>,
    ) -> Result<Option<AlertRecord>, CallbackError> {
        let ctx = SummaryContext {
            count: Some(aggregation.count),
            value: Some(aggregation.value),
            ..self.context(self.top(aggregation.all_events))
        };
        self.build_alert(&ctx, aggregation.events.to_vec()).map(Some)
    }

    fn on_event(&self, event: &Document) -> Result<Option<AlertRecord>, CallbackError> {
        let ctx = SummaryContext {
            event: Some(&event.source),
            ..self.context(self.top(std::slice::from_ref(event)))
        };
        self.build_alert(&ctx, vec![event.clone()]).map(Some)
    }
}

#[async_trait::async_trait]
impl AlertRule for DeclarativeRule {
    fn id(&self) -> &str {
        &self.definition.metadata.id
    }

    fn enabled(&self) -> bool {
        self.definition.metadata.enabled
    }

    async fn main(&self, task: &mut AlertTask<'_>) -> Result<(), EngineError> {
        let search = &self.definition.search;
        let mut query = task.build_query(self.window, search.must.clone())?;
        if let Some(field) = &search.time_field {
            query = query.with_time_field(field.clone());
        }
        if let Some(size) = search.size {
            query = query.with_size(size);
        }
        task.bind_query(query);

        match &self.definition.aggregate {
            Some(aggregate) => {
                task.search_events_aggregated(&aggregate.field, aggregate.samples_limit)
                    .await?;
                task.walk_aggregations(aggregate.threshold, self).await?;
            }
            None => {
                task.search_events_simple().await?;
                task.walk_events(self).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(yaml: &str) -> DeclarativeRule {
        DeclarativeRule::new(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    const AGGREGATED: &str = r#"
apiVersion: v1
kind: AlertRule
metadata: { id: amo-failed-logins, name: AMO failed logins }
search:
  window: 10m
  must:
    - exists: details.suser
aggregate: { field: details.suser, threshold: 2 }
alert:
  category: addons
  tags: [addons]
  summary: "{{ count }} amo failed logins: {{ value }}{% for ip in top %} {{ ip.value }} ({{ ip.count }} hits){% endfor %}"
  most_common: { field: details.sourceipaddress, limit: 2 }
"#;

    const PER_EVENT: &str = r#"
apiVersion: v1
kind: AlertRule
metadata: { id: ssl-blacklist-hit, name: SSL blacklist hit }
search: { window: 15m }
alert:
  category: correlatedalerts
  tags: [nsm]
  severity: WARNING
  url: https://runbooks.example/ssl
  summary: "{{ event.hostname }} {{ event.summary }}"
"#;

    fn login(ip: &str) -> Document {
        Document::new(json!({"details": {"suser": "a@x.com", "sourceipaddress": ip}}))
    }

    #[test]
    fn aggregation_summary_uses_all_events_for_top() {
        let rule = rule(AGGREGATED);
        let all = vec![login("10.0.0.2"), login("10.0.0.1"), login("10.0.0.1"), login("10.0.0.3")];
        let aggregation = Aggregation {
            count: 4,
            value: "a@x.com",
            events: &all[..1],
            all_events: &all,
        };

        let alert = rule.on_aggregation(&aggregation).unwrap().unwrap();
        assert_eq!(
            alert.summary(),
            "4 amo failed logins: a@x.com 10.0.0.1 (2 hits) 10.0.0.2 (1 hits)"
        );
        assert_eq!(alert.events().len(), 1);
        assert_eq!(alert.category(), "addons");
    }

    #[test]
    fn per_event_summary_and_url() {
        let rule = rule(PER_EVENT);
        let event = Document::new(json!({"hostname": "fw1", "summary": "SSL blacklist hit"}));

        let alert = rule.on_event(&event).unwrap().unwrap();
        assert_eq!(alert.summary(), "fw1 SSL blacklist hit");
        assert_eq!(alert.url(), Some("https://runbooks.example/ssl"));
        assert_eq!(alert.severity(), crate::alert::Severity::Warning);
        assert_eq!(alert.events(), &[event]);
    }

    #[test]
    fn missing_template_variable_renders_empty() {
        let rule = rule(PER_EVENT);
        let event = Document::new(json!({"hostname": "fw1"}));
        let alert = rule.on_event(&event).unwrap().unwrap();
        assert_eq!(alert.summary(), "fw1 ");
    }

    #[test]
    fn render_failure_is_a_callback_error() {
        let yaml = PER_EVENT.replace(
            "{{ event.hostname }} {{ event.summary }}",
            "{{ event.hostname | truncate_words }}",
        );
        let rule = rule(&yaml);
        let event = Document::new(json!({"hostname": "fw1"}));
        assert!(matches!(
            rule.on_event(&event),
            Err(CallbackError::Template(_))
        ));
    }

    #[test]
    fn invalid_definition_rejected() {
        let yaml = AGGREGATED.replace("threshold: 2", "threshold: 0");
        let definition: RuleDefinition = serde_yaml::from_str(&yaml).unwrap();
        assert!(DeclarativeRule::new(definition).is_err());
    }

    #[test]
    fn disabled_flag_is_honoured() {
        let yaml = PER_EVENT.replace(
            "{ id: ssl-blacklist-hit, name: SSL blacklist hit }",
            "{ id: ssl-blacklist-hit, name: SSL blacklist hit, enabled: false }",
        );
        assert!(!rule(&yaml).enabled());
    }
}
