//! compli CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or target
//! - 3: Pipeline failed (no usable rules)
//! - 4: Configuration or template error
//! - 130: Cancelled (report is still printed)

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, LogFormat};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const PIPELINE_FAILED: u8 = 3;
    pub const CONFIG_ERROR: u8 = 4;
    pub const CANCELLED: u8 = 130;
}

fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,compli=info"));

    // Logs go to stderr; stdout carries reports.
    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    if result.is_err() {
        // Logging already initialized, continue
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let result = match &cli.command {
        Commands::Import(args) => commands::import::execute(&cli, args).await,
        Commands::Scan(args) => commands::scan::execute(&cli, args).await,
        Commands::Rules(args) => commands::rules::execute(&cli, args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Map an error chain to an exit code.
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(pipeline) = e.downcast_ref::<compli_pipeline::PipelineError>() {
        return commands::exit_code_for(pipeline);
    }
    if e.downcast_ref::<compli_core::ComplianceError>().is_some() {
        return ExitCodes::CONFIG_ERROR;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("config") || msg.contains("template") {
        ExitCodes::CONFIG_ERROR
    } else if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
