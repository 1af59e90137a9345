//! Minijinja rendering for alert summaries.
//!
//! Summary templates are arbitrary strings from rule files (not
//! pre-registered), so a fresh [`minijinja::Environment`] is created per
//! render call.

use serde::Serialize;

use crate::error::ConfigurationError;

/// Renders alert summary templates.
#[derive(Debug, Default)]
pub struct SummaryRenderer {
    _private: (),
}

impl SummaryRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build a configured minijinja environment with custom filters.
    fn build_env<'source>() -> minijinja::Environment<'source> {
        let mut env = minijinja::Environment::new();
        env.add_filter("truncate_words", truncate_words_filter);
        env
    }

    /// Render a template string with the given context.
    pub fn render<C: Serialize>(&self, template_str: &str, ctx: &C) -> Result<String, String> {
        let env = Self::build_env();
        env.render_str(template_str, ctx).map_err(|e| e.to_string())
    }

    /// Check template syntax without evaluating it.
    pub fn validate(&self, template_str: &str) -> Result<(), ConfigurationError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| ConfigurationError::new(format!("invalid summary template: {e}")))?;
        Ok(())
    }
}

/// Keep at most `n` whitespace-separated words.
fn truncate_words_filter(value: String, n: usize) -> String {
    value.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}
