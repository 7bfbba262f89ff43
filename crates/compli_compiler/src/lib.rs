//! # compli_compiler
//!
//! Turns policy documents into deterministic detection rules.
//!
//! This crate provides:
//! - **Template table**: a versioned, data-driven `category -> patterns` mapping
//! - **Policy compiler**: bounded-parallel extraction followed by a
//!   single-threaded, id-ordered reduce into a deduplicated rule set
//! - **Built-in rules**: the hardcoded-secret and license-presence floor used
//!   when compilation yields nothing
//!
//! ## Example
//!
//! ```rust,ignore
//! use compli_compiler::{PolicyCompiler, TemplateTable};
//!
//! let table = TemplateTable::builtin()?;
//! let compiler = PolicyCompiler::new(analyzer, table, config.compiler.clone());
//! let output = compiler.compile(documents, &CancellationToken::new()).await?;
//! println!("{} rules, {} warnings", output.rules.len(), output.warnings.len());
//! ```

pub mod builtin;
pub mod compiler;
pub mod severity;
pub mod templates;

pub use builtin::{builtin_rules, BUILTIN_SOURCE};
pub use compiler::{CompileOutput, PolicyCompiler};
pub use severity::severity_from_text;
pub use templates::{CategoryTemplate, DetectionPatternTemplate, TemplateTable};
