//! # compli_core
//!
//! Shared foundation for the compli compliance pipeline.
//!
//! This crate provides:
//! - **Data model**: policies, rules, detection patterns and violations
//! - **Error taxonomy**: recoverable vs. fatal pipeline errors, and the warnings
//!   recoverable errors are downgraded to
//! - **Configuration**: compiler, scanner and scoring settings loaded from YAML
//! - **Collaborator seams**: the `TextAnalyzer` and `DocumentLoader` traits the
//!   pipeline consumes as black boxes
//!
//! ## Example
//!
//! ```rust,ignore
//! use compli_core::{ComplianceConfig, DetectionPattern, Rule, Severity};
//!
//! let config = ComplianceConfig::from_file(Path::new("compli.yaml"))?;
//! let rule = Rule::builder("security", "Hardcoded API key")
//!     .severity(Severity::High)
//!     .pattern(DetectionPattern::literal("API_KEY =", "API keys must come from a secret store"))
//!     .build(1);
//! ```

pub mod analysis;
pub mod cancel;
pub mod config;
pub mod error;
pub mod hash;
pub mod model;
pub mod warning;

pub use analysis::{
    AnalysisError, Classification, DocumentLoader, ExtractedRequirement, PolicyDocument,
    TextAnalyzer,
};
pub use cancel::CancellationToken;
pub use config::{CompilerConfig, ComplianceConfig, ScanLimits, ScoringConfig, SeverityWeights};
pub use error::{ComplianceError, ComplianceResult};
pub use model::{
    DetectionPattern, DocumentFormat, PatternKind, Policy, Rule, RuleBuilder, RuleSet, ScanStats,
    Severity, Violation,
};
pub use warning::{Warning, WarningKind};
