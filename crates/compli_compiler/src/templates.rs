//! Versioned category -> detection pattern template table.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use compli_core::{ComplianceError, ComplianceResult, DetectionPattern, PatternKind, Severity};

/// Templates are concrete patterns; compiling a requirement copies them verbatim.
pub type DetectionPatternTemplate = DetectionPattern;

const BUILTIN_TABLE: &str = include_str!("../templates/default.yaml");

/// Detection templates for one requirement category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryTemplate {
    pub description: String,
    /// Floor for the severity derived from requirement wording
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
    /// Extensions the compiled rule applies to; empty means all text files
    #[serde(default)]
    pub file_types: Vec<String>,
    /// Other category labels that resolve to this template
    #[serde(default)]
    pub aliases: Vec<String>,
    pub patterns: Vec<DetectionPatternTemplate>,
}

fn default_min_severity() -> Severity {
    Severity::Low
}

/// The compiler's category table, loaded once per compiler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateTable {
    pub version: u32,
    pub categories: BTreeMap<String, CategoryTemplate>,
}

impl TemplateTable {
    /// The table shipped with the binary.
    pub fn builtin() -> ComplianceResult<Self> {
        Self::from_yaml(BUILTIN_TABLE)
    }

    pub fn from_file(path: &Path) -> ComplianceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a table. Category names are normalized on load.
    pub fn from_yaml(yaml: &str) -> ComplianceResult<Self> {
        let raw: TemplateTable = serde_yaml::from_str(yaml)?;
        let categories = raw
            .categories
            .into_iter()
            .map(|(name, mut template)| {
                template.aliases = template.aliases.iter().map(|a| normalize_category(a)).collect();
                (normalize_category(&name), template)
            })
            .collect();
        let table = Self {
            version: raw.version,
            categories,
        };
        table.validate()?;
        debug!(
            "Loaded template table v{} with {} categories",
            table.version,
            table.categories.len()
        );
        Ok(table)
    }

    fn validate(&self) -> ComplianceResult<()> {
        for (name, template) in &self.categories {
            for pattern in &template.patterns {
                if pattern.value().trim().is_empty() {
                    return Err(ComplianceError::InvalidPattern {
                        rule: name.clone(),
                        message: format!("empty {} pattern", pattern.kind().as_str()),
                    });
                }
                if pattern.kind() == PatternKind::Regex {
                    Regex::new(pattern.value()).map_err(|e| ComplianceError::InvalidPattern {
                        rule: name.clone(),
                        message: format!("invalid regex '{}': {}", pattern.value(), e),
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Resolve a category label, directly or through an alias.
    ///
    /// Returns the canonical category name with its template.
    pub fn resolve(&self, category: &str) -> Option<(&str, &CategoryTemplate)> {
        let key = normalize_category(category);
        if let Some((name, template)) = self.categories.get_key_value(&key) {
            return Some((name.as_str(), template));
        }
        self.categories
            .iter()
            .find(|(_, t)| t.aliases.iter().any(|a| *a == key))
            .map(|(name, template)| (name.as_str(), template))
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }
}

/// Lower-case, trimmed, with `_` and whitespace folded to `-`.
pub fn normalize_category(category: &str) -> String {
    category
        .trim()
        .to_lowercase()
        .split(|c: char| c == '_' || c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_loads() {
        let table = TemplateTable::builtin().unwrap();
        assert!(table.version >= 1);
        for category in ["authentication", "encryption", "retention", "audit-logging", "consent"] {
            let (name, template) = table.resolve(category).unwrap();
            assert_eq!(name, category);
            assert!(!template.patterns.is_empty(), "{} has no patterns", category);
        }
    }

    #[test]
    fn test_resolve_alias_and_normalization() {
        let table = TemplateTable::builtin().unwrap();
        assert_eq!(table.resolve("Data_Protection").unwrap().0, "data-protection");
        assert_eq!(table.resolve("logging").unwrap().0, "audit-logging");
        assert_eq!(table.resolve(" Audit Logging ").unwrap().0, "audit-logging");
        assert!(table.resolve("liability").is_none());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let yaml = r#"
version: 3
categories:
  broken:
    description: broken
    patterns:
      - kind: regex
        value: '(unclosed'
        rationale: none
"#;
        let err = TemplateTable::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ComplianceError::InvalidPattern { .. }));
    }

    #[test]
    fn test_custom_table_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("templates.yaml");
        std::fs::write(
            &path,
            r#"
version: 7
categories:
  export_control:
    description: Export-controlled algorithms
    min_severity: HIGH
    file_types: [py]
    patterns:
      - kind: import
        value: cryptography
        rationale: Review export classification
"#,
        )
        .unwrap();

        let table = TemplateTable::from_file(&path).unwrap();
        assert_eq!(table.version, 7);
        let (name, template) = table.resolve("export control").unwrap();
        assert_eq!(name, "export-control");
        assert_eq!(template.min_severity, Severity::High);
        assert_eq!(template.file_types, vec!["py".to_string()]);
    }
}
