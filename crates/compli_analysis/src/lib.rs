//! # compli_analysis
//!
//! Reference adapters for the collaborators the compli pipeline consumes.
//!
//! This crate provides:
//! - **KeywordAnalyzer**: a rule-based `TextAnalyzer` that picks obligation
//!   sentences by modal indicators and categorizes them with keyword tables
//! - **FsDocumentLoader**: a `DocumentLoader` for plain-text and Markdown policy
//!   folders that reports PDF and Word documents as unsupported
//!
//! Deployments with a real extraction or classification service implement
//! `compli_core::TextAnalyzer` themselves and hand it to the coordinator.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use compli_analysis::{FsDocumentLoader, KeywordAnalyzer};
//!
//! let analyzer = Arc::new(KeywordAnalyzer::new());
//! let loader = Arc::new(FsDocumentLoader::new());
//! let requirements = analyzer.extract("Passwords must be hashed.").await?;
//! ```

pub mod keyword;
pub mod loader;

pub use keyword::KeywordAnalyzer;
pub use loader::FsDocumentLoader;
