//! Scan command - scan a repository and print the compliance report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use tracing::info;

use compli_pipeline::RuleSetRef;
use compli_scorer::ReportStatus;

use super::{cancel_on_ctrl_c, coordinator, exit_code_for, load_config, Cli, OutputFormat};
use crate::ExitCodes;

#[derive(Args)]
pub struct ScanArgs {
    /// Local directory or git URL (http://, https://, git@)
    pub target: String,

    /// Rule set written by `compli import`
    #[arg(long, conflicts_with = "policies")]
    pub rules: Option<PathBuf>,

    /// Compile this policy folder as part of the scan
    #[arg(long)]
    pub policies: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Files scanned in parallel (overrides config)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Maximum number of files to scan (overrides config)
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Maximum file size in bytes (overrides config)
    #[arg(long)]
    pub max_file_bytes: Option<u64>,
}

impl ScanArgs {
    fn rule_set(&self) -> RuleSetRef {
        match (&self.rules, &self.policies) {
            (Some(file), _) => RuleSetRef::File(file.clone()),
            (None, Some(folder)) => RuleSetRef::Policies(folder.clone()),
            (None, None) => RuleSetRef::Builtin,
        }
    }
}

pub async fn execute(cli: &Cli, args: &ScanArgs) -> Result<u8> {
    info!("Scanning {}", args.target);

    let config = load_config(cli)?;
    let mut limits = config.scanner.clone();
    if let Some(concurrency) = args.concurrency {
        limits = limits.with_concurrency(concurrency);
    }
    if let Some(max_files) = args.max_files {
        limits = limits.with_max_files(Some(max_files));
    }
    if let Some(bytes) = args.max_file_bytes {
        limits = limits.with_max_file_bytes(bytes);
    }

    let coordinator = coordinator(cli, config)?;
    let result = coordinator
        .scan_repository(&args.target, &args.rule_set(), &limits, &cancel_on_ctrl_c())
        .await;

    let report = match result {
        Ok(report) => report,
        Err(e) if args.format == OutputFormat::Json => {
            let failure = json!({
                "status": "failed",
                "error": e.to_string(),
                "code": e.code(),
            });
            println!("{}", serde_json::to_string_pretty(&failure)?);
            return Ok(exit_code_for(&e));
        }
        Err(e) => return Err(e).context("Scan failed"),
    };

    match args.format {
        OutputFormat::Json => {
            let json = report.to_json_pretty().context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text => println!("{}", report.render_text()),
    }

    if report.status == ReportStatus::Cancelled {
        Ok(ExitCodes::CANCELLED)
    } else {
        Ok(ExitCodes::SUCCESS)
    }
}
