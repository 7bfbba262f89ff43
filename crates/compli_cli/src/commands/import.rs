//! Import command - compile a policy folder into a rule-set file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::{cancel_on_ctrl_c, coordinator, load_config, Cli};
use crate::ExitCodes;

#[derive(Args)]
pub struct ImportArgs {
    /// Folder containing policy documents (.txt, .md)
    folder: PathBuf,

    /// Where to write the compiled rule set
    #[arg(short, long, default_value = "rules.json")]
    out: PathBuf,
}

pub async fn execute(cli: &Cli, args: &ImportArgs) -> Result<u8> {
    info!("Importing policies from {}", args.folder.display());

    let config = load_config(cli)?;
    let coordinator = coordinator(cli, config)?;
    let summary = coordinator
        .import_policies(&args.folder, &cancel_on_ctrl_c())
        .await
        .context("Failed to import policies")?;

    summary
        .rule_set_file()
        .save(&args.out)
        .context("Failed to write rule set")?;

    let json =
        serde_json::to_string_pretty(&summary).context("Failed to serialize import summary")?;
    println!("{}", json);
    Ok(ExitCodes::SUCCESS)
}
