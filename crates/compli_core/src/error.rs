//! Error taxonomy for the compliance pipeline.

use thiserror::Error;

use crate::warning::{Warning, WarningKind};

/// Result type alias for core operations.
pub type ComplianceResult<T> = Result<T, ComplianceError>;

/// Errors that can occur while compiling policies or scanning a repository.
///
/// Everything except [`ComplianceError::PipelineExhausted`] is recoverable: the
/// stage that hits it records a [`Warning`] and keeps going.
#[derive(Error, Debug)]
pub enum ComplianceError {
    #[error("Policy could not be processed: {path} - {reason}")]
    PolicyParse { path: String, reason: String },

    #[error("Unsupported document format: {path} ({format})")]
    UnsupportedDocumentFormat { path: String, format: String },

    #[error("Rule compilation produced no usable rules: {0}")]
    RuleCompilationDeficiency(String),

    #[error("File could not be read: {path} - {reason}")]
    FileAccess { path: String, reason: String },

    #[error("Scan timed out after {timeout_ms}ms: {path}")]
    ScanTimeout { path: String, timeout_ms: u64 },

    #[error("No usable rules after compilation and no built-in fallback configured")]
    PipelineExhausted,

    #[error("Invalid detection pattern in {rule}: {message}")]
    InvalidPattern { rule: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ComplianceError {
    /// Whether the run can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ComplianceError::PipelineExhausted | ComplianceError::InvalidConfiguration(_)
        )
    }

    /// Warning kind a recoverable error is recorded under.
    pub fn warning_kind(&self) -> WarningKind {
        match self {
            ComplianceError::PolicyParse { .. } => WarningKind::PolicyParse,
            ComplianceError::UnsupportedDocumentFormat { .. } => {
                WarningKind::UnsupportedDocumentFormat
            }
            ComplianceError::RuleCompilationDeficiency(_) => {
                WarningKind::RuleCompilationDeficiency
            }
            ComplianceError::ScanTimeout { .. } => WarningKind::ScanTimeout,
            ComplianceError::InvalidPattern { .. } => WarningKind::InvalidPattern,
            ComplianceError::FileAccess { .. }
            | ComplianceError::Io(_)
            | ComplianceError::Yaml(_)
            | ComplianceError::Json(_) => WarningKind::FileAccess,
            ComplianceError::PipelineExhausted | ComplianceError::InvalidConfiguration(_) => {
                WarningKind::RuleCompilationDeficiency
            }
        }
    }

    /// Downgrade this error into a warning about `subject`.
    pub fn to_warning(&self, subject: impl Into<String>) -> Warning {
        Warning::new(self.warning_kind(), subject, self.to_string())
    }
}
