//! # compli_scorer
//!
//! Reduces scan findings into a single compliance report.
//!
//! This crate provides:
//! - **Risk scoring**: severity-weighted penalties with diminishing weight for
//!   repeats of a rule in one file, fixed risk thresholds and a critical override
//! - **Recommendations**: one advisory per violated category
//! - **Report model**: the JSON wire shape consumed by API and UI layers, plus a
//!   human-readable rendering
//!
//! ## Example
//!
//! ```rust,ignore
//! use compli_scorer::RiskScorer;
//!
//! let scorer = RiskScorer::new(config.scoring.clone());
//! let report = scorer.score(output.violations, &rules, output.stats);
//! println!("{}", report.render_text());
//! ```

pub mod recommendations;
pub mod report;
pub mod scorer;

pub use recommendations::recommend;
pub use report::{
    CategoryCounts, Report, ReportStatus, ReportViolation, RiskLevel, ScanSummary,
    SeverityBreakdown,
};
pub use scorer::{risk_for_score, RiskScorer};
