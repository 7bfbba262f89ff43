//! Category-keyed advisories.

use std::collections::BTreeMap;

use crate::report::ReportViolation;

fn advice(category: &str) -> Option<&'static str> {
    let text = match category {
        "authentication" => "Remove hardcoded credentials and use a vetted identity provider",
        "encryption" => "Use TLS in transit and AES-256 or equivalent at rest",
        "retention" => "Define retention periods and purge stored data when they expire",
        "audit-logging" => "Record security-relevant events in a tamper-evident audit log",
        "consent" => "Gate collection and tracking of personal data on recorded user consent",
        "data-protection" => "Minimize or encrypt personal data before storing or logging it",
        "access-control" => "Enforce role-based authorization checks on every protected operation",
        "security" => "Move secrets out of source code into a secret manager",
        "licensing" => "Add a LICENSE file and review third-party license obligations",
        _ => return None,
    };
    Some(text)
}

/// One advisory per category with at least one violation.
///
/// Ordered by descending violation count, then category name. Each names the
/// count and a representative file: the one with the most violations in the
/// category, ties going to the smallest path.
pub fn recommend(violations: &[ReportViolation]) -> Vec<String> {
    let mut by_category: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    for v in violations {
        *by_category
            .entry(v.category.as_str())
            .or_default()
            .entry(v.violation.file_path.as_str())
            .or_default() += 1;
    }

    let mut ranked: Vec<(&str, usize, &str)> = by_category
        .iter()
        .map(|(category, files)| {
            let count: usize = files.values().sum();
            // paths iterate ascending; only a strictly larger count replaces the pick
            let file = files
                .iter()
                .fold(None::<(&str, usize)>, |best, (path, n)| match best {
                    Some((_, best_n)) if best_n >= *n => best,
                    _ => Some((*path, *n)),
                })
                .map(|(path, _)| path)
                .unwrap_or_default();
            (*category, count, file)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .map(|(category, count, file)| {
            let text = advice(category).map(str::to_string).unwrap_or_else(|| {
                format!("Review {} findings against the applicable policy", category)
            });
            let noun = if count == 1 { "violation" } else { "violations" };
            format!("{}: {} ({} {}, e.g. {})", category, text, count, noun, file)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use compli_core::{Severity, Violation};

    fn rv(category: &str, file: &str, line: usize) -> ReportViolation {
        ReportViolation {
            violation: Violation {
                rule_id: format!("{}-rule", category),
                file_path: file.to_string(),
                line_number: Some(line),
                matched_snippet: String::new(),
                severity: Severity::Medium,
                confidence: 0.9,
            },
            category: category.to_string(),
            description: String::new(),
            suggestion: String::new(),
        }
    }

    #[test]
    fn test_ordered_by_count_then_name() {
        let violations = vec![
            rv("encryption", "b.py", 1),
            rv("authentication", "a.py", 1),
            rv("encryption", "a.py", 2),
            rv("encryption", "b.py", 3),
            rv("consent", "z.js", 1),
        ];
        let recs = recommend(&violations);
        assert_eq!(recs.len(), 3);
        assert!(recs[0].starts_with("encryption:"));
        assert!(recs[0].contains("3 violations, e.g. b.py"));
        assert!(recs[1].starts_with("authentication:"));
        assert!(recs[1].contains("1 violation, e.g. a.py"));
        assert!(recs[2].starts_with("consent:"));
    }

    #[test]
    fn test_representative_file_tie_takes_smallest_path() {
        let violations = vec![rv("retention", "z.py", 1), rv("retention", "m.py", 1)];
        let recs = recommend(&violations);
        assert!(recs[0].ends_with("e.g. m.py)"));
    }

    #[test]
    fn test_unknown_category_gets_generic_advice() {
        let recs = recommend(&[rv("export-control", "x.py", 4)]);
        assert_eq!(
            recs[0],
            "export-control: Review export-control findings against the applicable policy \
             (1 violation, e.g. x.py)"
        );
    }

    #[test]
    fn test_no_violations_no_recommendations() {
        assert!(recommend(&[]).is_empty());
    }
}
