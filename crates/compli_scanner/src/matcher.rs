//! Per-file rule matching.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::time::Instant;

use regex::Regex;
use tracing::warn;

use compli_core::{DetectionPattern, RuleSet, Severity, Violation, Warning, WarningKind};

use crate::language::{LanguageHeuristic, LineKind};

const LITERAL_CONFIDENCE: f64 = 0.95;
const REGEX_CONFIDENCE: f64 = 0.9;
const IMPORT_CONFIDENCE: f64 = 0.85;
const FUNCTION_CONFIDENCE: f64 = 0.75;
const REQUIRED_FILE_CONFIDENCE: f64 = 1.0;

const MAX_SNIPPET_CHARS: usize = 160;

/// Lines matched between deadline checks.
const CHECKPOINT_LINES: usize = 256;

/// A rule with its patterns split by kind and its regexes compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub severity: Severity,
    pub file_types: BTreeSet<String>,
    pub literals: Vec<String>,
    pub regexes: Vec<Regex>,
    pub imports: Vec<String>,
    pub functions: Vec<String>,
    pub required_files: Vec<String>,
}

impl CompiledRule {
    pub fn applies_to(&self, extension: Option<&str>) -> bool {
        if self.file_types.is_empty() {
            return true;
        }
        extension
            .map(|ext| self.file_types.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    /// Whether the rule has anything to look for inside file contents.
    pub fn has_line_patterns(&self) -> bool {
        !(self.literals.is_empty()
            && self.regexes.is_empty()
            && self.imports.is_empty()
            && self.functions.is_empty())
    }

    /// First matching pattern on a line, honoring kind precedence.
    fn match_line(&self, line: &str, kind: Option<LineKind>) -> Option<f64> {
        if self.literals.iter().any(|l| line.contains(l.as_str())) {
            return Some(LITERAL_CONFIDENCE);
        }
        if self.regexes.iter().any(|r| r.is_match(line)) {
            return Some(REGEX_CONFIDENCE);
        }
        match kind {
            Some(LineKind::Import) if self.imports.iter().any(|i| line.contains(i.as_str())) => {
                Some(IMPORT_CONFIDENCE)
            }
            Some(LineKind::FunctionDefinition)
                if self.functions.iter().any(|f| line.contains(f.as_str())) =>
            {
                Some(FUNCTION_CONFIDENCE)
            }
            _ => None,
        }
    }
}

/// Compile the active rules of a set for scanning.
///
/// A regex that fails to compile is dropped with an `InvalidPattern` warning;
/// the rest of the rule still applies.
pub fn compile_rules(rules: &RuleSet) -> (Vec<CompiledRule>, Vec<Warning>) {
    let mut compiled = Vec::new();
    let mut warnings = Vec::new();

    for rule in rules.active() {
        let mut c = CompiledRule {
            id: rule.id.clone(),
            severity: rule.severity,
            file_types: rule.applicable_file_types.clone(),
            literals: Vec::new(),
            regexes: Vec::new(),
            imports: Vec::new(),
            functions: Vec::new(),
            required_files: Vec::new(),
        };
        for pattern in &rule.patterns {
            match pattern {
                DetectionPattern::Literal { value, .. } => c.literals.push(value.clone()),
                DetectionPattern::Regex { value, .. } => match Regex::new(value) {
                    Ok(re) => c.regexes.push(re),
                    Err(e) => {
                        warn!("Dropping invalid regex in rule {}: {}", rule.id, e);
                        warnings.push(Warning::new(
                            WarningKind::InvalidPattern,
                            rule.id.clone(),
                            format!("invalid regex '{}': {}", value, e),
                        ));
                    }
                },
                DetectionPattern::Import { value, .. } => c.imports.push(value.clone()),
                DetectionPattern::FunctionSignature { value, .. } => {
                    c.functions.push(value.clone())
                }
                DetectionPattern::RequiredFile { value, .. } => {
                    c.required_files.push(value.clone())
                }
            }
        }
        compiled.push(c);
    }

    (compiled, warnings)
}

/// Match file contents against the rules that apply to it.
///
/// Without a heuristic only literal and regex patterns are evaluated. A rule
/// yields at most one violation per line.
pub fn match_content(
    rules: &[&CompiledRule],
    relative: &str,
    content: &str,
    heuristic: Option<&dyn LanguageHeuristic>,
) -> Vec<Violation> {
    match_lines(rules, relative, content, heuristic, None).unwrap_or_default()
}

/// Like [`match_content`], but gives up once `deadline` has passed.
///
/// The deadline is checked after line classification and every
/// `CHECKPOINT_LINES` lines; `None` means the scan ran out of time.
pub fn match_content_until(
    rules: &[&CompiledRule],
    relative: &str,
    content: &str,
    heuristic: Option<&dyn LanguageHeuristic>,
    deadline: Instant,
) -> Option<Vec<Violation>> {
    match_lines(rules, relative, content, heuristic, Some(deadline))
}

fn match_lines(
    rules: &[&CompiledRule],
    relative: &str,
    content: &str,
    heuristic: Option<&dyn LanguageHeuristic>,
    deadline: Option<Instant>,
) -> Option<Vec<Violation>> {
    let expired = || deadline.is_some_and(|d| Instant::now() >= d);

    let lines: Vec<&str> = content.lines().collect();
    let kinds = heuristic.map(|h| h.classify_lines(&lines));
    if expired() {
        return None;
    }

    let mut seen: HashSet<(&str, usize)> = HashSet::new();
    let mut violations = Vec::new();

    for rule in rules {
        for (idx, line) in lines.iter().enumerate() {
            if idx % CHECKPOINT_LINES == CHECKPOINT_LINES - 1 && expired() {
                return None;
            }
            let kind = kinds.as_ref().and_then(|k| k.get(idx).copied());
            let Some(confidence) = rule.match_line(line, kind) else {
                continue;
            };
            let line_number = idx + 1;
            if !seen.insert((rule.id.as_str(), line_number)) {
                continue;
            }
            violations.push(Violation {
                rule_id: rule.id.clone(),
                file_path: relative.to_string(),
                line_number: Some(line_number),
                matched_snippet: snippet(line),
                severity: rule.severity,
                confidence,
            });
        }
    }

    Some(violations)
}

/// File-level violations for required files missing at the root.
///
/// A required name is satisfied by a root file with that name or that stem,
/// case-insensitively (`LICENSE` accepts `license.md`).
pub fn check_required_files(
    rules: &[CompiledRule],
    root: &Path,
) -> std::io::Result<Vec<Violation>> {
    if rules.iter().all(|r| r.required_files.is_empty()) {
        return Ok(Vec::new());
    }

    let mut present = HashSet::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if let Some((stem, _)) = name.split_once('.') {
            present.insert(stem.to_string());
        }
        present.insert(name);
    }

    let mut violations = Vec::new();
    for rule in rules {
        for required in &rule.required_files {
            if present.contains(&required.to_lowercase()) {
                continue;
            }
            violations.push(Violation {
                rule_id: rule.id.clone(),
                file_path: required.clone(),
                line_number: None,
                matched_snippet: format!("{} not found at repository root", required),
                severity: rule.severity,
                confidence: REQUIRED_FILE_CONFIDENCE,
            });
        }
    }
    Ok(violations)
}

fn snippet(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() <= MAX_SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let mut s: String = trimmed.chars().take(MAX_SNIPPET_CHARS).collect();
    s.push_str("...");
    s
}
