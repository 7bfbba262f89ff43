//! Data model shared by the compiler, scanner and scorer.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::ExtractedRequirement;
use crate::hash::{content_hash, fields_hash};
use crate::warning::Warning;

/// Severity of a rule and of the violations it produces.
///
/// Variants are declared in ascending order so `Ord` follows severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source document format of a policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Pdf,
    Doc,
    Docx,
}

impl DocumentFormat {
    /// Detect the format from a file extension. Unknown extensions are not policy documents.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(DocumentFormat::Text),
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            "pdf" => Some(DocumentFormat::Pdf),
            "doc" => Some(DocumentFormat::Doc),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    /// Whether raw text can be taken from this format without an extraction service.
    pub fn is_supported(&self) -> bool {
        matches!(self, DocumentFormat::Text | DocumentFormat::Markdown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Text => "txt",
            DocumentFormat::Markdown => "md",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Docx => "docx",
        }
    }
}

/// An ingested policy document together with what was extracted from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// SHA-256 of the raw text
    pub id: String,
    pub source_path: String,
    pub raw_text: String,
    pub format: DocumentFormat,
    pub extracted_requirements: Vec<ExtractedRequirement>,
}

impl Policy {
    pub fn new(
        source_path: impl Into<String>,
        format: DocumentFormat,
        raw_text: impl Into<String>,
        extracted_requirements: Vec<ExtractedRequirement>,
    ) -> Self {
        let raw_text = raw_text.into();
        Self {
            id: content_hash(raw_text.as_bytes()),
            source_path: source_path.into(),
            raw_text,
            format,
            extracted_requirements,
        }
    }
}

/// Kind of a detection pattern, in matching precedence order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Literal,
    Regex,
    Import,
    FunctionSignature,
    RequiredFile,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Literal => "literal",
            PatternKind::Regex => "regex",
            PatternKind::Import => "import",
            PatternKind::FunctionSignature => "function_signature",
            PatternKind::RequiredFile => "required_file",
        }
    }
}

/// What a rule looks for in a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionPattern {
    /// Case-sensitive substring of a line.
    Literal { value: String, rationale: String },
    /// Regular expression applied to each line.
    Regex { value: String, rationale: String },
    /// Substring of an import/include/require line.
    Import { value: String, rationale: String },
    /// Substring of a function or method definition line.
    FunctionSignature { value: String, rationale: String },
    /// File stem that must exist at the repository root.
    RequiredFile { value: String, rationale: String },
}

impl DetectionPattern {
    pub fn literal(value: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            rationale: rationale.into(),
        }
    }

    pub fn regex(value: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self::Regex {
            value: value.into(),
            rationale: rationale.into(),
        }
    }

    pub fn import(value: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self::Import {
            value: value.into(),
            rationale: rationale.into(),
        }
    }

    pub fn function_signature(value: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self::FunctionSignature {
            value: value.into(),
            rationale: rationale.into(),
        }
    }

    pub fn required_file(value: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self::RequiredFile {
            value: value.into(),
            rationale: rationale.into(),
        }
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            DetectionPattern::Literal { .. } => PatternKind::Literal,
            DetectionPattern::Regex { .. } => PatternKind::Regex,
            DetectionPattern::Import { .. } => PatternKind::Import,
            DetectionPattern::FunctionSignature { .. } => PatternKind::FunctionSignature,
            DetectionPattern::RequiredFile { .. } => PatternKind::RequiredFile,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            DetectionPattern::Literal { value, .. }
            | DetectionPattern::Regex { value, .. }
            | DetectionPattern::Import { value, .. }
            | DetectionPattern::FunctionSignature { value, .. }
            | DetectionPattern::RequiredFile { value, .. } => value,
        }
    }

    pub fn rationale(&self) -> &str {
        match self {
            DetectionPattern::Literal { rationale, .. }
            | DetectionPattern::Regex { rationale, .. }
            | DetectionPattern::Import { rationale, .. }
            | DetectionPattern::FunctionSignature { rationale, .. }
            | DetectionPattern::RequiredFile { rationale, .. } => rationale,
        }
    }

    /// Identity of the pattern for hashing and deduplication. The rationale is prose and
    /// does not take part.
    pub fn normalized_key(&self) -> String {
        format!("{}:{}", self.kind().as_str(), self.value().trim())
    }
}

/// A compiled, deterministic detection definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    pub patterns: BTreeSet<DetectionPattern>,
    /// Lower-case extensions without the dot; empty means every text file
    #[serde(default)]
    pub applicable_file_types: BTreeSet<String>,
    pub source_policy_ids: BTreeSet<String>,
    pub description: String,
    /// Requirement sentences this rule was compiled from
    #[serde(default)]
    pub obligations: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Rule {
    pub fn builder(category: impl Into<String>, description: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(category, description)
    }

    /// Deterministic id over the rule's defining inputs.
    pub fn compute_id(
        table_version: u32,
        category: &str,
        patterns: &BTreeSet<DetectionPattern>,
        source_policy_ids: &BTreeSet<String>,
    ) -> String {
        let mut keys: Vec<String> = patterns.iter().map(DetectionPattern::normalized_key).collect();
        keys.sort();
        keys.dedup();

        let mut fields = vec![format!("v{}", table_version), category.trim().to_lowercase()];
        fields.push(format!("patterns={}", keys.len()));
        fields.extend(keys);
        fields.push(format!("sources={}", source_policy_ids.len()));
        fields.extend(source_policy_ids.iter().cloned());

        let digest = fields_hash(fields);
        format!("{}-{}", slug(category), &digest[..16])
    }

    /// Recompute `id` after the defining inputs changed.
    pub fn reassign_id(&mut self, table_version: u32) {
        self.id = Self::compute_id(
            table_version,
            &self.category,
            &self.patterns,
            &self.source_policy_ids,
        );
    }

    /// Key under which two rules are considered the same detection logic.
    pub fn dedup_key(&self) -> (String, Vec<String>) {
        let mut keys: Vec<String> = self
            .patterns
            .iter()
            .map(DetectionPattern::normalized_key)
            .collect();
        keys.sort();
        keys.dedup();
        (self.category.trim().to_lowercase(), keys)
    }

    /// Whether a file with this extension is in scope for the rule.
    pub fn applies_to(&self, extension: Option<&str>) -> bool {
        if self.applicable_file_types.is_empty() {
            return true;
        }
        extension
            .map(|ext| self.applicable_file_types.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    /// Remediation hint for a violation of this rule.
    pub fn suggestion(&self) -> String {
        self.patterns
            .iter()
            .map(DetectionPattern::rationale)
            .find(|r| !r.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Review {} compliance requirements", self.category))
    }
}

fn slug(category: &str) -> String {
    let slug: String = category
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    if slug.is_empty() {
        "rule".to_string()
    } else {
        slug
    }
}

/// Builder for rules outside the compiler (built-in sets, tests).
pub struct RuleBuilder {
    category: String,
    description: String,
    severity: Severity,
    patterns: BTreeSet<DetectionPattern>,
    applicable_file_types: BTreeSet<String>,
    source_policy_ids: BTreeSet<String>,
    obligations: BTreeSet<String>,
}

impl RuleBuilder {
    pub fn new(category: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            description: description.into(),
            severity: Severity::Medium,
            patterns: BTreeSet::new(),
            applicable_file_types: BTreeSet::new(),
            source_policy_ids: BTreeSet::new(),
            obligations: BTreeSet::new(),
        }
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn pattern(mut self, pattern: DetectionPattern) -> Self {
        self.patterns.insert(pattern);
        self
    }

    pub fn patterns(mut self, patterns: impl IntoIterator<Item = DetectionPattern>) -> Self {
        self.patterns.extend(patterns);
        self
    }

    pub fn file_types<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.applicable_file_types.extend(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase()),
        );
        self
    }

    pub fn source(mut self, policy_id: impl Into<String>) -> Self {
        self.source_policy_ids.insert(policy_id.into());
        self
    }

    pub fn obligation(mut self, text: impl Into<String>) -> Self {
        self.obligations.insert(text.into());
        self
    }

    pub fn build(self, table_version: u32) -> Rule {
        let id = Rule::compute_id(
            table_version,
            &self.category,
            &self.patterns,
            &self.source_policy_ids,
        );
        Rule {
            id,
            category: self.category,
            severity: self.severity,
            patterns: self.patterns,
            applicable_file_types: self.applicable_file_types,
            source_policy_ids: self.source_policy_ids,
            description: self.description,
            obligations: self.obligations,
            active: true,
        }
    }
}

/// An immutable, id-ordered collection of rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build a set ordered by rule id. Later duplicates of an id are dropped.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut rules: Vec<Rule> = rules.into_iter().collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        rules.dedup_by(|b, a| a.id == b.id);
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn active(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.active)
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules
            .binary_search_by(|r| r.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.rules[i])
    }

    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}

/// A single match of a rule against a file location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub rule_id: String,
    /// Relative to the scan root, `/`-separated
    pub file_path: String,
    /// 1-based; `None` for file-level matches
    pub line_number: Option<usize>,
    pub matched_snippet: String,
    pub severity: Severity,
    pub confidence: f64,
}

impl Violation {
    /// Ordering used for every emitted violation list.
    pub fn sort_key(&self) -> (&str, Option<usize>, &str) {
        (&self.file_path, self.line_number, &self.rule_id)
    }

    pub fn sort(violations: &mut [Violation]) {
        violations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }
}

/// Counters accumulated across one pipeline run.
///
/// `files_skipped` counts files that were enumerated but not scanned
/// (oversized, unreadable or timed out); files past the `max_files` cap are
/// counted separately in `files_truncated`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub files_oversized: usize,
    pub files_unreadable: usize,
    pub files_timed_out: usize,
    pub files_truncated: usize,
    pub rules_applied: usize,
    pub policies_processed: usize,
    pub policies_skipped: usize,
    pub cancelled: bool,
    pub warnings: Vec<Warning>,
}

impl ScanStats {
    /// Fold another stage's counters into this one.
    pub fn absorb(&mut self, other: ScanStats) {
        self.files_scanned += other.files_scanned;
        self.files_skipped += other.files_skipped;
        self.files_oversized += other.files_oversized;
        self.files_unreadable += other.files_unreadable;
        self.files_timed_out += other.files_timed_out;
        self.files_truncated += other.files_truncated;
        self.rules_applied = self.rules_applied.max(other.rules_applied);
        self.policies_processed += other.policies_processed;
        self.policies_skipped += other.policies_skipped;
        self.cancelled |= other.cancelled;
        self.warnings.extend(other.warnings);
    }
}
