//! Report wire model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use compli_core::{ScanStats, Severity, Violation};

/// Overall risk of a scanned repository.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the run covered everything it was asked to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Completed,
    /// Cancelled mid-run; the report holds best-effort partial results
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityBreakdown {
    #[serde(rename = "HIGH")]
    pub high: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "LOW")]
    pub low: usize,
}

impl SeverityBreakdown {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanSummary {
    pub total_violations: usize,
    pub severity_breakdown: SeverityBreakdown,
    pub total_files_scanned: usize,
}

/// Violation counts of one category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryCounts {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl CategoryCounts {
    pub fn add(&mut self, severity: Severity) {
        self.total += 1;
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

/// A violation joined with the rule fields the UI displays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportViolation {
    #[serde(flatten)]
    pub violation: Violation,
    pub category: String,
    pub description: String,
    pub suggestion: String,
}

/// The scored output of one scan run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub status: ReportStatus,
    pub compliance_score: f64,
    pub risk_level: RiskLevel,
    pub scan_summary: ScanSummary,
    /// Sorted by (file_path, line_number, rule_id)
    pub violations: Vec<ReportViolation>,
    pub category_breakdown: BTreeMap<String, CategoryCounts>,
    pub recommendations: Vec<String>,
    pub stats: ScanStats,
}

impl Report {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary for terminals.
    pub fn render_text(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();

        out.push_str(&format!("{}\nCOMPLIANCE SCAN REPORT\n{}\n", rule, rule));
        if self.status == ReportStatus::Cancelled {
            out.push_str("Status: CANCELLED (partial results)\n");
        }
        out.push_str(&format!("Compliance Score: {:.1}%\n", self.compliance_score * 100.0));
        out.push_str(&format!("Risk Level: {}\n", self.risk_level));
        out.push_str(&format!("Total Violations: {}\n", self.scan_summary.total_violations));
        out.push_str(&format!(
            "Files Scanned: {} (skipped {}, truncated {})\n",
            self.stats.files_scanned, self.stats.files_skipped, self.stats.files_truncated
        ));
        out.push_str(&format!("Rules Applied: {}\n\n", self.stats.rules_applied));

        out.push_str("VIOLATIONS BY SEVERITY:\n");
        for severity in [Severity::High, Severity::Medium, Severity::Low] {
            let count = self.scan_summary.severity_breakdown.get(severity);
            out.push_str(&format!("  {}: {}\n", severity, count));
        }

        if !self.category_breakdown.is_empty() {
            out.push_str("\nVIOLATIONS BY CATEGORY:\n");
            for (category, counts) in &self.category_breakdown {
                out.push_str(&format!("  {}: {}\n", category, counts.total));
            }
        }

        let high: Vec<&ReportViolation> = self
            .violations
            .iter()
            .filter(|v| v.violation.severity == Severity::High)
            .take(10)
            .collect();
        if !high.is_empty() {
            out.push_str("\nHIGH SEVERITY VIOLATIONS:\n");
            for v in high {
                let location = match v.violation.line_number {
                    Some(line) => format!("{}:{}", v.violation.file_path, line),
                    None => v.violation.file_path.clone(),
                };
                out.push_str(&format!("  {} [{}]\n", location, v.violation.rule_id));
                out.push_str(&format!("    Issue: {}\n", v.description));
                out.push_str(&format!("    Suggestion: {}\n", v.suggestion));
            }
        }

        if !self.recommendations.is_empty() {
            out.push_str("\nRECOMMENDATIONS:\n");
            for r in &self.recommendations {
                out.push_str(&format!("  - {}\n", r));
            }
        }

        if !self.stats.warnings.is_empty() {
            out.push_str(&format!("\nWARNINGS ({}):\n", self.stats.warnings.len()));
            for w in &self.stats.warnings {
                out.push_str(&format!("  {}\n", w));
            }
        }

        out.push_str(&rule);
        out
    }
}
