//! CLI command definitions.
//!
//! Each subcommand maps to one coordinator operation. Helpers shared by the
//! commands (configuration, coordinator wiring, Ctrl-C handling) live here.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use compli_analysis::{FsDocumentLoader, KeywordAnalyzer};
use compli_compiler::TemplateTable;
use compli_core::{CancellationToken, ComplianceConfig};
use compli_pipeline::{Coordinator, PipelineError};

use crate::ExitCodes;

pub mod import;
pub mod rules;
pub mod scan;

/// compli - compile policy documents into rules and score repositories against them
#[derive(Parser)]
#[command(name = "compli")]
#[command(version, about = "compli - policy compliance scanner for source repositories")]
#[command(long_about = r#"
compli turns natural-language policy documents into detection rules and scans
source repositories for violations, producing a compliance score and risk level.

COMMANDS:
  import  → Compile a policy folder into a reusable rule-set file
  scan    → Scan a local directory or git URL and print a report
  rules   → List the built-in or a persisted rule set

EXIT CODES:
  0   - Success
  1   - General error
  2   - Invalid arguments or target
  3   - Pipeline failed (no usable rules)
  4   - Configuration or template error
  130 - Cancelled (partial report printed)
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(long, global = true, env = "COMPLI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Alternative category template table (YAML)
    #[arg(long, global = true, env = "COMPLI_TEMPLATES")]
    pub templates: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a folder of policy documents into a rule set
    Import(import::ImportArgs),

    /// Scan a repository and report violations
    Scan(scan::ScanArgs),

    /// List rules
    Rules(rules::RulesArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Configuration from `--config`, or defaults.
pub fn load_config(cli: &Cli) -> Result<ComplianceConfig> {
    match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            let config = ComplianceConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            config.validate().context("Invalid config")?;
            Ok(config)
        }
        None => Ok(ComplianceConfig::default()),
    }
}

/// Coordinator wired with the filesystem loader and the keyword analyzer.
pub fn coordinator(cli: &Cli, config: ComplianceConfig) -> Result<Coordinator> {
    let mut coordinator = Coordinator::new(
        Arc::new(KeywordAnalyzer::new()),
        Arc::new(FsDocumentLoader::new()),
        config,
    )?;
    if let Some(path) = &cli.templates {
        let table = TemplateTable::from_file(path)
            .with_context(|| format!("Failed to load template table {}", path.display()))?;
        coordinator = coordinator.with_templates(table);
    }
    Ok(coordinator)
}

/// Token cancelled on Ctrl-C. In-flight work finishes and a partial result is returned.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight work");
            handle.cancel();
        }
    });
    token
}

pub fn exit_code_for(e: &PipelineError) -> u8 {
    match e {
        PipelineError::Exhausted => ExitCodes::PIPELINE_FAILED,
        PipelineError::InvalidTarget(_) | PipelineError::RuleSet { .. } => ExitCodes::INVALID_ARGS,
        PipelineError::Checkout(_) => ExitCodes::GENERAL_ERROR,
        PipelineError::Core(_) => ExitCodes::CONFIG_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_arguments() {
        let cli = Cli::parse_from([
            "compli",
            "--log-format",
            "json",
            "scan",
            "./repo",
            "--policies",
            "./policies",
            "--format",
            "json",
            "--concurrency",
            "2",
        ]);
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.target, "./repo");
                assert_eq!(args.format, OutputFormat::Json);
                assert_eq!(args.concurrency, Some(2));
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_rules_and_policies_conflict() {
        let parsed =
            Cli::try_parse_from(["compli", "scan", ".", "--rules", "r.json", "--policies", "p"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "compli",
            "--config",
            temp.path().join("absent.yaml").to_str().unwrap(),
            "rules",
        ]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&PipelineError::Exhausted), ExitCodes::PIPELINE_FAILED);
        assert_eq!(
            exit_code_for(&PipelineError::InvalidTarget("x".into())),
            ExitCodes::INVALID_ARGS
        );
    }
}
