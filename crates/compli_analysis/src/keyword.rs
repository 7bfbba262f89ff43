//! Rule-based requirement extraction and classification.

use async_trait::async_trait;
use tracing::debug;

use compli_core::{AnalysisError, Classification, ExtractedRequirement, TextAnalyzer};

/// Words that mark a sentence as an obligation.
const INDICATORS: &[&str] = &[
    "must",
    "shall",
    "required",
    "mandatory",
    "obligation",
    "prohibited",
    "forbidden",
    "not allowed",
    "ensure",
    "implement",
];

/// Category keyword table. Earlier entries win ties.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "authentication",
        &["password", "credential", "authenticat", "login", "multi-factor", "mfa", "passphrase"],
    ),
    ("encryption", &["encrypt", "cipher", "tls", "ssl", "cryptograph", "plaintext", "hashing"]),
    ("retention", &["retain", "retention", "deletion", "delete", "purge", "storage period"]),
    ("audit-logging", &["audit", "logging", "log entries", "trail", "monitoring", "logged"]),
    ("consent", &["consent", "opt-in", "opt in", "opt-out", "cookie", "tracking"]),
    (
        "data-protection",
        &[
            "personal data",
            "gdpr",
            "data protection",
            "pii",
            "personal information",
            "data subject",
        ],
    ),
    ("access-control", &["access control", "authoriz", "role", "permission", "least privilege"]),
    ("licensing", &["license", "licence", "copyright", "open source", "attribution"]),
];

/// Label returned when no category keyword is present.
pub const GENERAL_CATEGORY: &str = "general";

const BASE_CONFIDENCE: f64 = 0.7;
const KEYWORD_BONUS: f64 = 0.05;
const MAX_CONFIDENCE: f64 = 0.95;
const MAX_REQUIREMENTS: usize = 25;
/// Distinct keyword hits at which document classification is fully confident.
const CLASSIFY_SATURATION: usize = 3;

/// Keyword-table `TextAnalyzer`.
///
/// Deterministic and offline; used when no external analysis service is
/// configured.
#[derive(Debug, Clone, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Obligation sentences with their category and confidence.
    pub fn extract_requirements(&self, text: &str) -> Vec<ExtractedRequirement> {
        let mut requirements = Vec::new();
        for sentence in sentences(text) {
            let lower = sentence.to_lowercase();
            if !INDICATORS.iter().any(|i| contains_word(&lower, i)) {
                continue;
            }
            let requirement = match best_category(&lower) {
                Some((category, hits)) => {
                    let bonus = KEYWORD_BONUS * (hits - 1) as f64;
                    let confidence = (BASE_CONFIDENCE + bonus).min(MAX_CONFIDENCE);
                    ExtractedRequirement::new(sentence, category, confidence)
                }
                None => ExtractedRequirement::new(sentence, GENERAL_CATEGORY, BASE_CONFIDENCE),
            };
            requirements.push(requirement);
            if requirements.len() == MAX_REQUIREMENTS {
                break;
            }
        }
        debug!("Extracted {} requirements", requirements.len());
        requirements
    }

    /// Category with the most keyword hits across the whole document.
    pub fn classify_text(&self, text: &str) -> Classification {
        match best_category(&text.to_lowercase()) {
            Some((category, hits)) => Classification {
                label: category.to_string(),
                confidence: (hits as f64 / CLASSIFY_SATURATION as f64).min(1.0),
            },
            None => Classification {
                label: GENERAL_CATEGORY.to_string(),
                confidence: 0.0,
            },
        }
    }
}

#[async_trait]
impl TextAnalyzer for KeywordAnalyzer {
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedRequirement>, AnalysisError> {
        Ok(self.extract_requirements(text))
    }

    async fn classify(&self, text: &str) -> Result<Classification, AnalysisError> {
        Ok(self.classify_text(text))
    }
}

/// Sentences split on terminal punctuation and line breaks, with list and
/// heading markers stripped.
fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '!', '?', '\n'])
        .map(|s| s.trim().trim_start_matches(['-', '*', '#', '>']).trim())
        .filter(|s| !s.is_empty())
}

/// Distinct keyword hits of the best category, if any.
fn best_category(lower: &str) -> Option<(&'static str, usize)> {
    let mut best: Option<(&'static str, usize)> = None;
    for (category, keywords) in CATEGORY_KEYWORDS {
        let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((*category, hits));
        }
    }
    best
}

/// Whole-word (or whole-phrase) containment.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "# Security Policy\n\
        All personal data must be encrypted at rest using TLS or AES.\n\
        Employees should take training. Passwords shall never be stored in plaintext.\n\
        - Audit logging is mandatory for administrator actions\n\
        The mustard is yellow.\n";

    #[test]
    fn test_extracts_obligation_sentences() {
        let reqs = KeywordAnalyzer::new().extract_requirements(POLICY);
        let texts: Vec<&str> = reqs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "All personal data must be encrypted at rest using TLS or AES",
                "Passwords shall never be stored in plaintext",
                "Audit logging is mandatory for administrator actions",
            ]
        );
        assert_eq!(reqs[0].category, "encryption");
        assert_eq!(reqs[1].category, "authentication");
        assert_eq!(reqs[2].category, "audit-logging");
        assert!(reqs.iter().all(|r| (BASE_CONFIDENCE..=MAX_CONFIDENCE).contains(&r.confidence)));
    }

    #[test]
    fn test_uncategorized_requirement_is_general() {
        let reqs = KeywordAnalyzer::new().extract_requirements("Vendors must sign the agreement.");
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].category, GENERAL_CATEGORY);
        assert_eq!(reqs[0].confidence, BASE_CONFIDENCE);
    }

    #[test]
    fn test_requirement_cap() {
        let text = "Passwords must be rotated.\n".repeat(40);
        assert_eq!(KeywordAnalyzer::new().extract_requirements(&text).len(), MAX_REQUIREMENTS);
    }

    #[test]
    fn test_classify() {
        let analyzer = KeywordAnalyzer::new();
        let c = analyzer.classify_text("Users must give consent before tracking cookies are set.");
        assert_eq!(c.label, "consent");
        assert_eq!(c.confidence, 1.0);

        let none = analyzer.classify_text("Lunch is served at noon.");
        assert_eq!(none.label, GENERAL_CATEGORY);
        assert_eq!(none.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_trait_is_deterministic() {
        let analyzer = KeywordAnalyzer::new();
        let a = analyzer.extract(POLICY).await.unwrap();
        let b = analyzer.extract(POLICY).await.unwrap();
        assert_eq!(a, b);
    }
}
