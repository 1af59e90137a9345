//! alert-worker: runs every enabled alert rule once and exits.
//!
//! Meant to be invoked by an external scheduler (cron, systemd timer).
//! Alerts are written to stdout as JSON lines; logs go to stderr.

mod dry_run;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use tripwire_core::Config;
use tripwire_opensearch::OpenSearchClient;
use tripwire_rules::{
    AlertRule, DeclarativeRule, Engine, EngineSettings, JsonLinesSink, RuleLoader, SearchBackend,
};

use crate::dry_run::DryRunBackend;

// ── CLI ─────────────────────────────────────────────────────────────

/// Run alert rules against the event store.
#[derive(Parser, Debug)]
#[command(name = "alert-worker", version, about)]
struct Cli {
    /// Directory scanned for rule YAML files.
    #[arg(long, env = "RULES_DIR")]
    rules_dir: Option<PathBuf>,

    /// Only run the rule with this id (repeatable).
    #[arg(long = "rule", value_name = "ID")]
    rules: Vec<String>,

    /// Print the generated query DSL instead of querying.
    #[arg(long)]
    dry_run: bool,
}

/// Enabled rules, narrowed to `only` when non-empty. Unknown ids are an error.
fn select_rules(
    loaded: Vec<Arc<DeclarativeRule>>,
    only: &[String],
) -> anyhow::Result<Vec<Arc<DeclarativeRule>>> {
    if let Some(missing) = only
        .iter()
        .find(|id| !loaded.iter().any(|r| r.id() == id.as_str()))
    {
        bail!("unknown rule id '{}'", missing);
    }

    Ok(loaded
        .into_iter()
        .filter(|r| only.is_empty() || only.iter().any(|id| id == r.id()))
        .filter(|r| {
            if !r.enabled() {
                info!(rule_id = %r.id(), "rule disabled, skipping");
            }
            r.enabled()
        })
        .collect())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tripwire_core::config::load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let rules_dir = cli.rules_dir.unwrap_or_else(|| config.rules.dir.clone());
    let mut loader = RuleLoader::new(rules_dir);
    let load_failures = loader.load_all()?.iter().filter(|r| r.is_failed()).count();
    if load_failures > 0 {
        warn!(failures = load_failures, "some rule files failed to load");
    }

    let rules = select_rules(loader.rules(), &cli.rules)?;
    if rules.is_empty() {
        warn!(rules_dir = %loader.rules_dir().display(), "no rules to run");
    }

    let backend: Arc<dyn SearchBackend> = if cli.dry_run {
        Arc::new(DryRunBackend::stdout(config.opensearch.index.clone()))
    } else {
        Arc::new(OpenSearchClient::from_config(&config.opensearch))
    };
    let settings = EngineSettings::from(&config.engine);
    let engine = Arc::new(Engine::new(
        backend,
        Arc::new(JsonLinesSink::stdout()),
        settings,
    ));

    let mut runs = JoinSet::new();
    for rule in rules {
        let engine = Arc::clone(&engine);
        runs.spawn(async move {
            let result = engine.run(&*rule).await;
            (rule.id().to_string(), result)
        });
    }

    let mut failed = 0usize;
    let mut alerts = 0usize;
    while let Some(joined) = runs.join_next().await {
        match joined {
            Ok((_, Ok(report))) => alerts += report.walk.alerts_emitted,
            Ok((rule_id, Err(e))) => {
                // Logged by the engine.
                debug!(rule_id = %rule_id, error = %e, "run failed");
                failed += 1;
            }
            Err(e) => {
                error!(error = %e, "rule task panicked or was cancelled");
                failed += 1;
            }
        }
    }

    info!(alerts, failed, load_failures, "alert-worker finished");
    if failed > 0 || load_failures > 0 {
        bail!("{} rule run(s) failed, {} rule file(s) failed to load", failed, load_failures);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripwire_rules::schema::RuleDefinition;

    fn rule(id: &str, enabled: bool) -> Arc<DeclarativeRule> {
        let yaml = format!(
            r#"
apiVersion: v1
kind: AlertRule
metadata: {{ id: {id}, name: {id}, enabled: {enabled} }}
search: {{ window: 5m }}
alert: {{ category: test, summary: "{{{{ event.hostname }}}}" }}
"#
        );
        let definition: RuleDefinition = serde_yaml::from_str(&yaml).unwrap();
        Arc::new(DeclarativeRule::new(definition).unwrap())
    }

    fn ids(rules: &[Arc<DeclarativeRule>]) -> Vec<&str> {
        rules.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn selects_enabled_rules() {
        let selected = select_rules(vec![rule("a", true), rule("b", false)], &[]).unwrap();
        assert_eq!(ids(&selected), vec!["a"]);
    }

    #[test]
    fn narrows_to_requested_ids() {
        let loaded = vec![rule("a", true), rule("b", true), rule("c", true)];
        let selected = select_rules(loaded, &["c".to_string(), "a".to_string()]).unwrap();
        assert_eq!(ids(&selected), vec!["a", "c"]);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let err = select_rules(vec![rule("a", true)], &["zzz".to_string()]).unwrap_err();
        assert!(err.to_string().contains("zzz"));
    }
}
