//! Built-in minimal rule set.
//!
//! Always available as the floor when policy compilation yields no rules.

use compli_core::{DetectionPattern, Rule, RuleSet, Severity};

/// Source id recorded on built-in rules.
pub const BUILTIN_SOURCE: &str = "builtin";

/// Built-in rules are versioned independently from any template table.
const BUILTIN_VERSION: u32 = 0;

/// Hardcoded-secret detection and license-file presence.
pub fn builtin_rules() -> RuleSet {
    let mut rules = Vec::new();

    // No secrets in code
    rules.push(
        Rule::builder("security", "Hardcoded secrets are not allowed in code")
            .severity(Severity::High)
            .pattern(DetectionPattern::regex(
                r#"(?i)\b(password|passwd|secret|api[_-]?key|token)\s*[=:]\s*['"][^'"]{4,}['"]"#,
                "Load secrets from the environment or a secret manager",
            ))
            .pattern(DetectionPattern::regex(
                r"AKIA[0-9A-Z]{16}",
                "Rotate the key and load cloud credentials from the environment",
            ))
            .pattern(DetectionPattern::regex(
                r"-----BEGIN (RSA |DSA |EC |OPENSSH )?PRIVATE KEY-----",
                "Store private keys in a key vault, never in the repository",
            ))
            .source(BUILTIN_SOURCE)
            .build(BUILTIN_VERSION),
    );

    // Required LICENSE
    rules.push(
        Rule::builder("licensing", "All projects must have a LICENSE file")
            .severity(Severity::Low)
            .pattern(DetectionPattern::required_file(
                "LICENSE",
                "Add a LICENSE file at the repository root",
            ))
            .source(BUILTIN_SOURCE)
            .build(BUILTIN_VERSION),
    );

    RuleSet::from_rules(rules)
}
