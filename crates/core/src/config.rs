use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub opensearch: OpenSearchConfig,
    pub engine: EngineConfig,
    pub rules: RulesConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TRIPWIRE_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TRIPWIRE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            opensearch: OpenSearchConfig::from_env_profiled(p),
            engine: EngineConfig::from_env_profiled(p),
            rules: RulesConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  opensearch:  url={}, index={}, auth={}",
            self.opensearch.base_url(),
            self.opensearch.index,
            self.opensearch.username.is_some()
        );
        tracing::info!(
            "  engine:      samples_limit={}, search_size={}, time_field={}, deadline_ms={}",
            self.engine.samples_limit,
            self.engine.search_size,
            self.engine.time_field,
            self.engine.deadline_ms
        );
        tracing::info!("  rules:       dir={}", self.rules.dir.display());
    }
}

// ── OpenSearch / Elasticsearch ────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSearchConfig {
    pub host: String,
    pub port: u16,
    /// Index or index pattern searched by every rule (e.g. `events-*`).
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_ssl: bool,
}

impl OpenSearchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "OPENSEARCH_HOST", "localhost"),
            port: profiled_env_u16(p, "OPENSEARCH_PORT", 9200),
            index: profiled_env_or(p, "OPENSEARCH_INDEX", "events"),
            username: profiled_env_opt(p, "OPENSEARCH_USERNAME"),
            password: profiled_env_opt(p, "OPENSEARCH_PASSWORD"),
            use_ssl: profiled_env_or(p, "OPENSEARCH_USE_SSL", "false") == "true",
        }
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sample documents kept per aggregation group when a rule sets none.
    pub samples_limit: usize,
    /// Maximum documents fetched per rule execution.
    pub search_size: usize,
    /// Timestamp field the time window is applied to.
    pub time_field: String,
    /// Deadline for the backend call of one rule execution.
    pub deadline_ms: u64,
}

impl EngineConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            samples_limit: profiled_env_usize(p, "ALERT_SAMPLES_LIMIT", 15),
            search_size: profiled_env_usize(p, "ALERT_SEARCH_SIZE", 1000),
            time_field: profiled_env_or(p, "ALERT_TIME_FIELD", "utctimestamp"),
            deadline_ms: profiled_env_u64(p, "ALERT_DEADLINE_MS", 30_000),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            samples_limit: 15,
            search_size: 1000,
            time_field: "utctimestamp".to_string(),
            deadline_ms: 30_000,
        }
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub dir: PathBuf,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            dir: PathBuf::from(profiled_env_or(p, "RULES_DIR", "data/rules")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_prefix_wins_over_plain_key() {
        env::set_var("TRIPWIRE_CFG_TEST_OPENSEARCH_INDEX", "prod-events");
        env::set_var("OPENSEARCH_PORT", "9300");

        let config = Config::for_profile("tripwire_cfg_test");
        assert_eq!(config.profile, "TRIPWIRE_CFG_TEST");
        assert_eq!(config.opensearch.index, "prod-events");
        assert_eq!(config.opensearch.port, 9300);

        env::remove_var("TRIPWIRE_CFG_TEST_OPENSEARCH_INDEX");
        env::remove_var("OPENSEARCH_PORT");
    }

    #[test]
    fn engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.samples_limit, 15);
        assert_eq!(engine.search_size, 1000);
        assert_eq!(engine.time_field, "utctimestamp");
    }

    #[test]
    fn base_url_scheme() {
        let mut cfg = OpenSearchConfig::from_env_profiled("TRIPWIRE_URL_TEST");
        cfg.host = "search.internal".to_string();
        cfg.port = 9200;
        cfg.use_ssl = true;
        assert_eq!(cfg.base_url(), "https://search.internal:9200");
    }
}
