//! Pipeline stages and their transitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum PipelineStage {
    Ingest,
    CompileRules,
    Scan,
    Score,
    Report,
    /// Terminal: reached only when compilation leaves no usable rule
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Ingest => "INGEST",
            PipelineStage::CompileRules => "COMPILE_RULES",
            PipelineStage::Scan => "SCAN",
            PipelineStage::Score => "SCORE",
            PipelineStage::Report => "REPORT",
            PipelineStage::Failed => "FAILED",
        }
    }

    /// The stage that follows on success.
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Ingest => Some(PipelineStage::CompileRules),
            PipelineStage::CompileRules => Some(PipelineStage::Scan),
            PipelineStage::Scan => Some(PipelineStage::Score),
            PipelineStage::Score => Some(PipelineStage::Report),
            PipelineStage::Report | PipelineStage::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Report | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logs the stages a run passes through.
#[derive(Debug, Clone)]
pub(crate) struct StageTracker {
    history: Vec<PipelineStage>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    /// A tracker positioned at INGEST.
    pub fn new() -> Self {
        info!("Pipeline stage: {}", PipelineStage::Ingest);
        Self {
            history: vec![PipelineStage::Ingest],
        }
    }

    pub fn current(&self) -> PipelineStage {
        self.history.last().copied().unwrap_or(PipelineStage::Ingest)
    }

    /// Move to the next stage. Does nothing once a terminal stage is reached.
    pub fn advance(&mut self) -> PipelineStage {
        if let Some(next) = self.current().next() {
            info!("Pipeline stage: {} -> {}", self.current(), next);
            self.history.push(next);
        }
        self.current()
    }

    /// Enter FAILED from the current stage.
    pub fn fail(&mut self, reason: &str) {
        if self.current().is_terminal() {
            return;
        }
        warn!("Pipeline stage: {} -> {} ({})", self.current(), PipelineStage::Failed, reason);
        self.history.push(PipelineStage::Failed);
    }

    #[cfg(test)]
    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut tracker = StageTracker::new();
        while !tracker.current().is_terminal() {
            tracker.advance();
        }
        assert_eq!(
            tracker.history(),
            &[
                PipelineStage::Ingest,
                PipelineStage::CompileRules,
                PipelineStage::Scan,
                PipelineStage::Score,
                PipelineStage::Report
            ]
        );
        assert_eq!(tracker.advance(), PipelineStage::Report);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut tracker = StageTracker::new();
        tracker.advance();
        tracker.fail("no rules");
        assert_eq!(tracker.current(), PipelineStage::Failed);
        assert_eq!(tracker.advance(), PipelineStage::Failed);
        tracker.fail("again");
        assert_eq!(tracker.history().len(), 3);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&PipelineStage::CompileRules).unwrap();
        assert_eq!(json, "\"COMPILE_RULES\"");
    }
}
