//! Seams to the external collaborators the pipeline consumes.
//!
//! The text-analysis capability and the document loader are never implemented
//! by the core crates. The pipeline receives them as trait objects at
//! construction time.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ComplianceResult;
use crate::model::DocumentFormat;

/// A requirement phrase extracted from policy text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedRequirement {
    pub text: String,
    /// e.g. `encryption`, `authentication`, `retention`, `audit-logging`, `consent`
    pub category: String,
    /// In `[0, 1]`
    pub confidence: f64,
}

impl ExtractedRequirement {
    pub fn new(text: impl Into<String>, category: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            confidence,
        }
    }
}

/// Document-level classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub label: String,
    pub confidence: f64,
}

/// Recoverable failure of the text-analysis capability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Text analysis unavailable: {0}")]
    Unavailable(String),

    #[error("Text analysis rejected the document: {0}")]
    Rejected(String),

    #[error("Text analysis timed out after {0}ms")]
    Timeout(u64),
}

/// Requirement extraction and document classification.
///
/// Implementations must be free of side effects visible to the pipeline:
/// calling either method twice with the same text returns the same answer.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedRequirement>, AnalysisError>;

    async fn classify(&self, text: &str) -> Result<Classification, AnalysisError>;
}

/// Raw policy text as supplied by the document loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyDocument {
    pub path: String,
    pub format: DocumentFormat,
    pub raw_text: String,
}

/// Supplies policy documents from a folder.
pub trait DocumentLoader: Send + Sync {
    /// Candidate policy files under `folder`, in a stable order.
    fn discover(&self, folder: &Path) -> ComplianceResult<Vec<PathBuf>>;

    /// Load one document. Formats without text extraction fail with
    /// `ComplianceError::UnsupportedDocumentFormat`.
    fn load(&self, path: &Path) -> ComplianceResult<PolicyDocument>;
}
