//! Error types for the pipeline coordinator.

use thiserror::Error;

use compli_core::ComplianceError;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that end a pipeline run.
///
/// Recoverable stage problems never surface here; they are recorded as
/// warnings in the report.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No usable rules after compilation and no built-in fallback configured")]
    Exhausted,

    #[error("Invalid scan target: {0}")]
    InvalidTarget(String),

    #[error("Repository checkout failed: {0}")]
    Checkout(String),

    #[error("Rule set could not be loaded: {path} - {reason}")]
    RuleSet { path: String, reason: String },

    #[error(transparent)]
    Core(#[from] ComplianceError),
}

impl PipelineError {
    /// The run reached the FAILED stage, as opposed to being rejected before it started.
    pub fn is_failed_run(&self) -> bool {
        matches!(self, PipelineError::Exhausted)
    }

    /// Stable identifier for machine-readable output.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Exhausted => "pipeline_exhausted",
            PipelineError::InvalidTarget(_) => "invalid_target",
            PipelineError::Checkout(_) => "checkout_failed",
            PipelineError::RuleSet { .. } => "rule_set_unavailable",
            PipelineError::Core(_) => "core_error",
        }
    }
}
