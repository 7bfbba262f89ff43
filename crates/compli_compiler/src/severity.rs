//! Severity derived from the modal wording of a requirement.

use compli_core::Severity;

const MANDATORY: &[&str] = &["must", "mandatory", "required", "shall", "prohibited", "forbidden"];
const ADVISORY: &[&str] = &["should", "recommended", "advised"];

/// `must`/`shall`-style obligations are HIGH, `should`-style are MEDIUM, anything else LOW.
pub fn severity_from_text(text: &str) -> Severity {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| MANDATORY.contains(w)) {
        Severity::High
    } else if words.iter().any(|w| ADVISORY.contains(w)) {
        Severity::Medium
    } else {
        Severity::Low
    }
}
