//! # compli_pipeline
//!
//! Sequences policy compilation, repository scanning and risk scoring.
//!
//! This crate provides:
//! - **Coordinator**: the `import_policies` and `scan_repository` entry points,
//!   with the text-analysis capability and document loader injected at construction
//! - **Stage logging**: every run logs INGEST -> COMPILE_RULES -> SCAN -> SCORE -> REPORT,
//!   with FAILED reserved for runs left without any usable rule
//! - **Rule-set persistence**: compiled rules saved as versioned JSON and reused by later scans
//! - **Remote checkout**: shallow `git clone` of URL targets into a temporary directory
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use compli_pipeline::{Coordinator, RuleSetRef};
//!
//! let coordinator = Coordinator::new(analyzer, loader, config)?;
//! let report = coordinator
//!     .scan_repository("https://github.com/org/app.git", &RuleSetRef::Builtin, &limits, &cancel)
//!     .await?;
//! println!("{}", report.to_json_pretty()?);
//! ```

pub mod coordinator;
pub mod error;
pub mod git;
pub mod ruleset;
mod stage;

pub use coordinator::{Coordinator, ImportSummary};
pub use error::{PipelineError, PipelineResult};
pub use ruleset::{RuleSetFile, RuleSetRef};
