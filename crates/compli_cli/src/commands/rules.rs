//! Rules command - list the built-in or a persisted rule set.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use compli_compiler::builtin_rules;
use compli_core::RuleSet;
use compli_pipeline::RuleSetFile;

use super::{Cli, OutputFormat};
use crate::ExitCodes;

#[derive(Args)]
pub struct RulesArgs {
    /// Rule set written by `compli import` (defaults to the built-in rules)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

pub async fn execute(_cli: &Cli, args: &RulesArgs) -> Result<u8> {
    let rules = match &args.rules {
        Some(path) => RuleSetFile::load(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()))?
            .rule_set(),
        None => builtin_rules(),
    };

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(rules.rules())
                .context("Failed to serialize rules")?;
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", render(&rules)),
    }
    Ok(ExitCodes::SUCCESS)
}

fn render(rules: &RuleSet) -> String {
    let mut out = String::new();
    for rule in rules.rules() {
        let state = if rule.active { "" } else { " (inactive)" };
        out.push_str(&format!(
            "{}  {:<6}  {:<16}  {}{}\n",
            short_id(&rule.id),
            rule.severity.as_str(),
            rule.category,
            rule.description,
            state
        ));
        for pattern in &rule.patterns {
            out.push_str(&format!("    {:<18} {}\n", pattern.kind().as_str(), pattern.value()));
        }
    }
    out.push_str(&format!("{} rules\n", rules.len()));
    out
}

/// First characters of a rule id; persisted files may carry any id text.
fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_builtin() {
        let text = render(&builtin_rules());
        assert!(text.contains("security"));
        assert!(text.contains("required_file"));
        assert!(text.ends_with("2 rules\n"));
    }

    #[test]
    fn test_render_multibyte_ids() {
        let mut rule = builtin_rules().into_rules().remove(0);
        rule.id = "aéééééé-0123-extra".to_string();
        let text = render(&RuleSet::from_rules(vec![rule]));
        assert!(text.starts_with("aéééééé-0123  "));
        assert_eq!(short_id("abc"), "abc");
    }
}
