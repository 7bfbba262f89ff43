//! Warnings accumulated across pipeline stages.

use serde::{Deserialize, Serialize};

/// Category of a recoverable problem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    PolicyParse,
    UnsupportedDocumentFormat,
    DuplicatePolicy,
    LowConfidence,
    UnmappedCategory,
    RuleCompilationDeficiency,
    InvalidPattern,
    FileAccess,
    ScanTimeout,
    Oversized,
    Truncated,
    Cancelled,
}

/// A recoverable problem recorded instead of failing the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Warning {
    pub kind: WarningKind,
    /// Policy path, file path or rule id the warning is about
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}: {}", self.kind, self.subject, self.message)
    }
}
