//! Pipeline configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ComplianceError, ComplianceResult};
use crate::model::Severity;

/// Top-level configuration, usually read from `compli.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComplianceConfig {
    pub compiler: CompilerConfig,
    pub scanner: ScanLimits,
    pub scoring: ScoringConfig,
}

impl ComplianceConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> ComplianceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML. Missing sections take their defaults.
    pub fn from_yaml(yaml: &str) -> ComplianceResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ComplianceResult<()> {
        if !(0.0..=1.0).contains(&self.compiler.confidence_floor) {
            return Err(ComplianceError::InvalidConfiguration(format!(
                "compiler.confidence_floor must be within [0, 1], got {}",
                self.compiler.confidence_floor
            )));
        }
        if self.compiler.concurrency == 0 || self.scanner.concurrency == 0 {
            return Err(ComplianceError::InvalidConfiguration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.scoring.repeat_decay) {
            return Err(ComplianceError::InvalidConfiguration(format!(
                "scoring.repeat_decay must be within [0, 1], got {}",
                self.scoring.repeat_decay
            )));
        }
        let w = &self.scoring.weights;
        if !(w.high > w.medium && w.medium > w.low && w.low >= 0.0) {
            return Err(ComplianceError::InvalidConfiguration(
                "scoring.weights must satisfy high > medium > low >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Policy-to-rule compiler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompilerConfig {
    /// Requirements extracted below this confidence are discarded
    pub confidence_floor: f64,
    /// Use the built-in rule set when compilation yields nothing
    pub fallback_to_builtin: bool,
    /// Per-call bound on the text-analysis capability
    pub extraction_timeout_ms: u64,
    /// Concurrent extraction requests
    pub concurrency: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.5,
            fallback_to_builtin: true,
            extraction_timeout_ms: 10_000,
            concurrency: 4,
        }
    }
}

impl CompilerConfig {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }
}

/// Repository scanner limits and exclusions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanLimits {
    /// Files larger than this are recorded as skipped
    pub max_file_bytes: u64,
    /// Files past this count are not scanned and reported as truncated
    pub max_files: Option<usize>,
    pub per_file_timeout_ms: u64,
    pub concurrency: usize,
    /// Directory names never descended into
    pub excluded_dirs: Vec<String>,
    /// Extensions treated as binary
    pub binary_extensions: Vec<String>,
    /// Glob patterns, relative to the scan root, excluded from the scan
    pub exclude_globs: Vec<String>,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_files: Some(10_000),
            per_file_timeout_ms: 5_000,
            concurrency: 8,
            excluded_dirs: [
                ".git",
                "node_modules",
                "vendor",
                "target",
                "dist",
                "build",
                "__pycache__",
                ".venv",
                "venv",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            binary_extensions: [
                "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "pdf", "doc", "docx",
                "xls", "xlsx", "ppt", "pptx", "zip", "gz", "tar", "tgz", "bz2", "xz", "7z", "rar",
                "jar", "war", "exe", "dll", "so", "dylib", "bin", "o", "a", "class", "pyc", "wasm",
                "woff", "woff2", "ttf", "eot", "mp3", "mp4", "mov", "avi", "sqlite", "db",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude_globs: Vec::new(),
        }
    }
}

impl ScanLimits {
    pub fn per_file_timeout(&self) -> Duration {
        Duration::from_millis(self.per_file_timeout_ms)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_files(mut self, max_files: Option<usize>) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    pub fn is_binary_extension(&self, ext: &str) -> bool {
        self.binary_extensions.iter().any(|b| b.eq_ignore_ascii_case(ext))
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }
}

/// Penalty per violation by severity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeverityWeights {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            high: 0.20,
            medium: 0.10,
            low: 0.05,
        }
    }
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// Risk scorer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: SeverityWeights,
    /// The k-th repeat (0-based) of a rule within one file weighs `weight * repeat_decay^k`
    pub repeat_decay: f64,
    /// A HIGH violation with confidence above this forces risk to at least MEDIUM
    pub critical_confidence_ceiling: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: SeverityWeights::default(),
            repeat_decay: 0.5,
            critical_confidence_ceiling: 0.9,
        }
    }
}
