//! Compliance score and risk level.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use compli_core::{RuleSet, ScanStats, ScoringConfig, Severity, Violation};

use crate::recommendations::recommend;
use crate::report::{
    CategoryCounts, Report, ReportStatus, ReportViolation, RiskLevel, ScanSummary,
    SeverityBreakdown,
};

const LOW_RISK_THRESHOLD: f64 = 0.8;
const MEDIUM_RISK_THRESHOLD: f64 = 0.5;

const UNKNOWN_CATEGORY: &str = "unknown";

/// Fixed thresholds: `>= 0.8` LOW, `>= 0.5` MEDIUM, otherwise HIGH.
pub fn risk_for_score(score: f64) -> RiskLevel {
    if score >= LOW_RISK_THRESHOLD {
        RiskLevel::Low
    } else if score >= MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Turns violations into a [`Report`].
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    config: ScoringConfig,
}

impl RiskScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score starting at 1.0, minus a severity weight per violation.
    ///
    /// The k-th repeat (0-based) of the same rule in the same file weighs
    /// `weight * repeat_decay^k`. Clamped to [0, 1].
    pub fn compliance_score(&self, violations: &[Violation]) -> f64 {
        let mut repeats: HashMap<(&str, &str), i32> = HashMap::new();
        let mut penalty = 0.0;
        for v in violations {
            let k = repeats.entry((v.rule_id.as_str(), v.file_path.as_str())).or_insert(0);
            penalty += self.config.weights.weight(v.severity) * self.config.repeat_decay.powi(*k);
            *k += 1;
        }
        round4((1.0 - penalty).clamp(0.0, 1.0))
    }

    /// Risk from the score, raised to at least MEDIUM by any HIGH violation
    /// above the critical confidence ceiling.
    pub fn risk_level(&self, score: f64, violations: &[Violation]) -> RiskLevel {
        let level = risk_for_score(score);
        let ceiling = self.config.critical_confidence_ceiling;
        let critical = violations
            .iter()
            .any(|v| v.severity == Severity::High && v.confidence > ceiling);
        if critical && level < RiskLevel::Medium {
            debug!("Critical override raises risk from {} to MEDIUM", level);
            RiskLevel::Medium
        } else {
            level
        }
    }

    pub fn score(
        &self,
        mut violations: Vec<Violation>,
        rules: &RuleSet,
        stats: ScanStats,
    ) -> Report {
        Violation::sort(&mut violations);

        let compliance_score = self.compliance_score(&violations);
        let risk_level = self.risk_level(compliance_score, &violations);

        let mut severity_breakdown = SeverityBreakdown::default();
        let mut category_breakdown: BTreeMap<String, CategoryCounts> = BTreeMap::new();
        let report_violations: Vec<ReportViolation> = violations
            .into_iter()
            .map(|violation| {
                let rule = rules.get(&violation.rule_id);
                let category = rule
                    .map(|r| r.category.clone())
                    .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
                severity_breakdown.add(violation.severity);
                category_breakdown.entry(category.clone()).or_default().add(violation.severity);
                ReportViolation {
                    category,
                    description: rule.map(|r| r.description.clone()).unwrap_or_default(),
                    suggestion: rule
                        .map(|r| r.suggestion())
                        .unwrap_or_else(|| "Review required".to_string()),
                    violation,
                }
            })
            .collect();

        let recommendations = recommend(&report_violations);
        let status = if stats.cancelled {
            ReportStatus::Cancelled
        } else {
            ReportStatus::Completed
        };

        info!(
            "Compliance score {:.3} ({} risk) from {} violations",
            compliance_score,
            risk_level,
            report_violations.len()
        );

        Report {
            status,
            compliance_score,
            risk_level,
            scan_summary: ScanSummary {
                total_violations: report_violations.len(),
                severity_breakdown,
                total_files_scanned: stats.files_scanned,
            },
            violations: report_violations,
            category_breakdown,
            recommendations,
            stats,
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
