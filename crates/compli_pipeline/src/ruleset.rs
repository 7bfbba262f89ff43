//! Persisted rule sets and rule-set references.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use compli_core::{Rule, RuleSet};

use crate::error::{PipelineError, PipelineResult};

/// Which rules a scan runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSetRef {
    /// The built-in secrets and license rules
    Builtin,
    /// A rule set previously written by an import
    File(PathBuf),
    /// Compile the policies in this folder as part of the run
    Policies(PathBuf),
}

/// On-disk form of a compiled rule set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleSetFile {
    /// Template table version the rules were compiled with
    pub table_version: u32,
    pub generated_at: DateTime<Utc>,
    pub rules: Vec<Rule>,
}

impl RuleSetFile {
    pub fn new(table_version: u32, rules: &RuleSet) -> Self {
        Self {
            table_version,
            generated_at: Utc::now(),
            rules: rules.rules().to_vec(),
        }
    }

    pub fn rule_set(&self) -> RuleSet {
        RuleSet::from_rules(self.rules.iter().cloned())
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| rule_set_error(path, e))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| rule_set_error(path, e))?;
        }
        std::fs::write(path, json).map_err(|e| rule_set_error(path, e))?;
        info!("Wrote {} rules to {}", self.rules.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| rule_set_error(path, e))?;
        let file: Self = serde_json::from_str(&content).map_err(|e| rule_set_error(path, e))?;
        info!(
            "Loaded {} rules (table v{}) from {}",
            file.rules.len(),
            file.table_version,
            path.display()
        );
        Ok(file)
    }
}

fn rule_set_error(path: &Path, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::RuleSet {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compli_core::{DetectionPattern, Severity};

    #[test]
    fn test_save_and_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out/rules.json");
        let rules = RuleSet::from_rules(vec![Rule::builder("security", "API key")
            .severity(Severity::High)
            .pattern(DetectionPattern::literal("API_KEY =", "env"))
            .build(2)]);

        RuleSetFile::new(2, &rules).save(&path).unwrap();
        let loaded = RuleSetFile::load(&path).unwrap();
        assert_eq!(loaded.table_version, 2);
        assert_eq!(loaded.rule_set(), rules);

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"kind\": \"literal\""));
    }

    #[test]
    fn test_corrupt_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("rules.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(RuleSetFile::load(&path), Err(PipelineError::RuleSet { .. })));
        assert!(matches!(
            RuleSetFile::load(&temp.path().join("missing.json")),
            Err(PipelineError::RuleSet { .. })
        ));
    }
}
