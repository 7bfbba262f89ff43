//! # compli_scanner
//!
//! Scans a filesystem tree against a compiled rule set.
//!
//! This crate provides:
//! - **Scan targets**: lazy, deterministic traversal with vendor/binary/oversized exclusions
//! - **Language heuristics**: per-family lexical detection of import and
//!   function-definition lines, registered by file extension
//! - **Matcher**: literal, regex, import and function-signature matching with
//!   per-line deduplication
//! - **Scanner**: bounded-parallel, timeout-guarded, cancellable file scanning
//!   with a stable output order
//!
//! ## Example
//!
//! ```rust,ignore
//! use compli_scanner::{RepositoryScanner, ScanTarget};
//!
//! let target = ScanTarget::new("./my-repo", &limits)?;
//! let output = RepositoryScanner::new().scan(&target, &rules, &limits, &cancel).await;
//! for violation in &output.violations {
//!     println!("{}:{:?} {}", violation.file_path, violation.line_number, violation.rule_id);
//! }
//! ```

pub mod language;
pub mod matcher;
pub mod scanner;
pub mod target;

pub use language::{HeuristicRegistry, LanguageHeuristic, LineKind};
pub use matcher::{compile_rules, CompiledRule};
pub use scanner::{RepositoryScanner, ScanOutput};
pub use target::{Candidate, ScanTarget};
