//! Core [`RuleLoader`] struct: filesystem-backed rule loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::declarative::DeclarativeRule;
use crate::schema::{RuleDefinition, RuleEnvelope, RULE_KIND};
use crate::task::AlertRule;

use super::error::{LoadResult, LoadStatus, Result, RuleError};

/// Filesystem-backed rule loader.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files, validates
/// each as an `AlertRule` document and keeps the results keyed by
/// `metadata.id`. Files are visited in path order, so when two files claim
/// the same id the one sorting first wins.
pub struct RuleLoader {
    /// Root directory containing rule YAML files.
    rules_dir: PathBuf,
    rules: BTreeMap<String, Arc<DeclarativeRule>>,
    origins: BTreeMap<String, PathBuf>,
}

impl RuleLoader {
    pub fn new(rules_dir: PathBuf) -> Self {
        Self {
            rules_dir,
            rules: BTreeMap::new(),
            origins: BTreeMap::new(),
        }
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Replace the loaded set with a fresh scan of the rules directory.
    ///
    /// Dotfiles (filenames starting with `.`) and non-YAML files are skipped.
    /// Subdirectories are scanned recursively.
    /// Parse errors are reported per-file but do not abort the scan.
    pub fn load_all(&mut self) -> Result<Vec<LoadResult>> {
        self.rules.clear();
        self.origins.clear();

        let mut results = Vec::new();
        let rules_dir = self.rules_dir.clone();
        self.scan_dir_recursive(&rules_dir, &mut results)?;
        Ok(results)
    }

    /// Recursively scan a directory for YAML rule files.
    fn scan_dir_recursive(&mut self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        let mut paths = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        paths.sort();

        for path in paths {
            // Skip dotfiles/dotdirs
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    if path.is_file() {
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: "dotfile".to_string(),
                            },
                        });
                    }
                    continue;
                }
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yml" || e == "yaml")
                .unwrap_or(false);

            if !is_yaml {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            let status = match self.load_file(&path).and_then(|rule| self.insert(&path, rule)) {
                Ok(rule_id) => {
                    info!(rule_id = %rule_id, path = %path.display(), "loaded rule");
                    LoadStatus::Loaded { rule_id }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule file");
                    LoadStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            results.push(LoadResult { path, status });
        }

        Ok(())
    }

    fn insert(&mut self, path: &Path, rule: DeclarativeRule) -> Result<String> {
        let rule_id = rule.id().to_string();
        if let Some(existing) = self.origins.get(&rule_id) {
            return Err(RuleError::Validation(format!(
                "duplicate rule id '{}' (already loaded from {})",
                rule_id,
                existing.display()
            )));
        }
        self.origins.insert(rule_id.clone(), path.to_path_buf());
        self.rules.insert(rule_id.clone(), Arc::new(rule));
        Ok(rule_id)
    }

    /// Parse and validate a single YAML file.
    ///
    /// The header is read first so a foreign `kind` is reported as such
    /// rather than as a field mismatch.
    pub fn load_file(&self, path: &Path) -> Result<DeclarativeRule> {
        let contents = fs::read_to_string(path)?;

        let envelope: RuleEnvelope = serde_yaml::from_str(&contents)?;
        if envelope.metadata.id.is_empty() {
            return Err(RuleError::Validation(
                "rule metadata.id must not be empty".to_string(),
            ));
        }
        if envelope.kind != RULE_KIND {
            return Err(RuleError::Validation(format!(
                "rule '{}' has unsupported kind '{}'",
                envelope.metadata.id, envelope.kind
            )));
        }

        let definition: RuleDefinition = serde_yaml::from_str(&contents).map_err(|e| {
            RuleError::Validation(format!(
                "failed to parse rule '{}': {}",
                envelope.metadata.id, e
            ))
        })?;
        Ok(DeclarativeRule::new(definition)?)
    }

    /// All loaded rules, ordered by id.
    pub fn rules(&self) -> Vec<Arc<DeclarativeRule>> {
        self.rules.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<DeclarativeRule>> {
        self.rules.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
