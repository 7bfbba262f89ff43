//! Policy-to-rule compiler.
//!
//! Extraction runs concurrently, bounded by `CompilerConfig::concurrency`.
//! Results are then reduced on a single thread in policy-id order, so the
//! compiled rule set does not depend on completion order.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use compli_core::hash::content_hash;
use compli_core::{
    AnalysisError, CancellationToken, Classification, CompilerConfig, ComplianceError,
    ComplianceResult, Policy, PolicyDocument, Rule, RuleSet, TextAnalyzer, Warning, WarningKind,
};

use crate::builtin::builtin_rules;
use crate::severity::severity_from_text;
use crate::templates::TemplateTable;

/// A policy after the text-analysis capability has processed it.
#[derive(Debug, Clone)]
pub struct ExtractedPolicy {
    pub policy: Policy,
    pub classification: Option<Classification>,
}

/// Result of compiling a batch of policy documents.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub rules: RuleSet,
    pub warnings: Vec<Warning>,
    /// Ids of the policies that contributed, in id order
    pub policy_ids: Vec<String>,
    pub policies_processed: usize,
    pub policies_skipped: usize,
    /// Compilation yielded nothing and the built-in set was substituted
    pub used_builtin: bool,
    pub cancelled: bool,
}

enum Extraction {
    Done {
        extracted: ExtractedPolicy,
        warning: Option<Warning>,
    },
    Failed(Warning),
}

/// Compiles policy documents into a deduplicated rule set.
pub struct PolicyCompiler {
    analyzer: Arc<dyn TextAnalyzer>,
    table: Arc<TemplateTable>,
    config: CompilerConfig,
}

impl PolicyCompiler {
    pub fn new(
        analyzer: Arc<dyn TextAnalyzer>,
        table: TemplateTable,
        config: CompilerConfig,
    ) -> Self {
        Self {
            analyzer,
            table: Arc::new(table),
            config,
        }
    }

    pub fn table(&self) -> &TemplateTable {
        &self.table
    }

    /// Compile documents into rules.
    ///
    /// Fails only with `ComplianceError::PipelineExhausted`, when nothing compiled
    /// and the built-in fallback is disabled. A cancelled run instead returns
    /// whatever it compiled, possibly nothing, with `cancelled` set.
    pub async fn compile(
        &self,
        documents: Vec<PolicyDocument>,
        cancel: &CancellationToken,
    ) -> ComplianceResult<CompileOutput> {
        let mut warnings = Vec::new();
        let mut policies_skipped = 0;

        let documents = self.prepare(documents, &mut warnings, &mut policies_skipped);
        info!("Compiling {} policy documents", documents.len());

        let total = documents.len();
        let (extractions, dispatched) = self.extract_all(documents, cancel).await;
        let cancelled = dispatched < total;
        if cancelled {
            policies_skipped += total - dispatched;
            warnings.push(Warning::new(
                WarningKind::Cancelled,
                "compiler",
                format!("cancelled with {} policies not processed", total - dispatched),
            ));
        }

        let mut extracted = Vec::new();
        for extraction in extractions {
            match extraction {
                Extraction::Done { extracted: e, warning } => {
                    warnings.extend(warning);
                    extracted.push(e);
                }
                Extraction::Failed(w) => {
                    warn!("{}", w);
                    warnings.push(w);
                    policies_skipped += 1;
                }
            }
        }
        extracted.sort_by(|a, b| a.policy.id.cmp(&b.policy.id));

        let (rules, reduce_warnings) = self.reduce(&extracted);
        warnings.extend(reduce_warnings);

        let policy_ids = extracted.iter().map(|e| e.policy.id.clone()).collect();
        let mut output = CompileOutput {
            rules,
            warnings,
            policy_ids,
            policies_processed: extracted.len(),
            policies_skipped,
            used_builtin: false,
            cancelled,
        };

        if output.rules.is_empty() {
            if output.cancelled && !self.config.fallback_to_builtin {
                // partial result; the caller reports the run as cancelled
                info!("Compilation cancelled before any rule was produced");
                return Ok(output);
            }
            if !self.config.fallback_to_builtin {
                return Err(ComplianceError::PipelineExhausted);
            }
            let deficiency = ComplianceError::RuleCompilationDeficiency(format!(
                "{} policies yielded no rules; using built-in rule set",
                output.policies_processed
            ));
            warn!("{}", deficiency);
            output.warnings.push(deficiency.to_warning("compiler"));
            output.rules = builtin_rules();
            output.used_builtin = true;
        }

        info!(
            "Compiled {} rules from {} policies ({} skipped)",
            output.rules.len(),
            output.policies_processed,
            output.policies_skipped
        );
        Ok(output)
    }

    /// Drop unsupported and duplicate documents, ordering the rest by content hash.
    fn prepare(
        &self,
        documents: Vec<PolicyDocument>,
        warnings: &mut Vec<Warning>,
        skipped: &mut usize,
    ) -> Vec<PolicyDocument> {
        let mut by_id: BTreeMap<String, PolicyDocument> = BTreeMap::new();

        for document in documents {
            if !document.format.is_supported() {
                let err = ComplianceError::UnsupportedDocumentFormat {
                    path: document.path.clone(),
                    format: document.format.as_str().to_string(),
                };
                warn!("{}", err);
                warnings.push(err.to_warning(&document.path));
                *skipped += 1;
                continue;
            }
            if document.raw_text.trim().is_empty() {
                let err = ComplianceError::PolicyParse {
                    path: document.path.clone(),
                    reason: "document is empty".to_string(),
                };
                warnings.push(err.to_warning(&document.path));
                *skipped += 1;
                continue;
            }

            let id = content_hash(document.raw_text.as_bytes());
            match by_id.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(document);
                }
                Entry::Occupied(existing) => {
                    // Keep the lexicographically first path so the survivor is stable.
                    let (kept, dropped) = if document.path < existing.get().path {
                        (document, existing.get().path.clone())
                    } else {
                        (existing.get().clone(), document.path)
                    };
                    warnings.push(Warning::new(
                        WarningKind::DuplicatePolicy,
                        dropped.clone(),
                        format!("identical to {}", kept.path),
                    ));
                    *skipped += 1;
                    *existing.into_mut() = kept;
                }
            }
        }

        by_id.into_values().collect()
    }

    /// Run extraction with bounded parallelism. Returns the extractions and how
    /// many documents were dispatched before cancellation.
    async fn extract_all(
        &self,
        documents: Vec<PolicyDocument>,
        cancel: &CancellationToken,
    ) -> (Vec<Extraction>, usize) {
        let sem = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut join_set = JoinSet::new();
        let limit = self.config.extraction_timeout();
        let mut dispatched = 0;

        for document in documents {
            if cancel.is_cancelled() {
                break;
            }
            let permit = match sem.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let analyzer = Arc::clone(&self.analyzer);
            dispatched += 1;
            join_set.spawn(async move {
                let _permit = permit;
                extract_one(analyzer, document, limit).await
            });
        }

        let mut extractions = Vec::with_capacity(dispatched);
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(extraction) => extractions.push(extraction),
                Err(e) => extractions.push(Extraction::Failed(Warning::new(
                    WarningKind::PolicyParse,
                    "extraction task",
                    format!("extraction task failed: {}", e),
                ))),
            }
        }
        (extractions, dispatched)
    }

    /// Map extracted requirements onto templates and merge identical rules.
    ///
    /// `policies` must be sorted by policy id.
    pub fn reduce(&self, policies: &[ExtractedPolicy]) -> (RuleSet, Vec<Warning>) {
        let floor = self.config.confidence_floor;
        let mut warnings = Vec::new();
        let mut merged: BTreeMap<(String, Vec<String>), Rule> = BTreeMap::new();

        for extracted in policies {
            let policy = &extracted.policy;
            // The classification only helps when it is itself confident enough.
            let fallback = extracted
                .classification
                .as_ref()
                .filter(|c| c.confidence >= floor)
                .and_then(|c| self.table.resolve(&c.label));

            for requirement in &policy.extracted_requirements {
                if !(requirement.confidence >= floor) {
                    debug!(
                        "Discarding requirement below floor ({:.2} < {:.2}) in {}",
                        requirement.confidence, floor, policy.source_path
                    );
                    warnings.push(Warning::new(
                        WarningKind::LowConfidence,
                        policy.source_path.clone(),
                        format!(
                            "requirement discarded at confidence {:.2} (floor {:.2}): {}",
                            requirement.confidence,
                            floor,
                            truncate(&requirement.text, 80)
                        ),
                    ));
                    continue;
                }

                let resolved = self.table.resolve(&requirement.category).or(fallback);
                let Some((category, template)) = resolved else {
                    warnings.push(Warning::new(
                        WarningKind::UnmappedCategory,
                        policy.source_path.clone(),
                        format!("no detection template for category '{}'", requirement.category),
                    ));
                    continue;
                };
                if template.patterns.is_empty() {
                    continue;
                }

                let severity = severity_from_text(&requirement.text).max(template.min_severity);
                let rule = Rule::builder(category, template.description.clone())
                    .severity(severity)
                    .patterns(template.patterns.iter().cloned())
                    .file_types(&template.file_types)
                    .source(policy.id.clone())
                    .obligation(requirement.text.trim())
                    .build(self.table.version);

                match merged.entry(rule.dedup_key()) {
                    Entry::Vacant(slot) => {
                        slot.insert(rule);
                    }
                    Entry::Occupied(mut slot) => merge_into(slot.get_mut(), rule),
                }
            }
        }

        let rules = merged.into_values().map(|mut rule| {
            rule.reassign_id(self.table.version);
            rule
        });
        (RuleSet::from_rules(rules), warnings)
    }
}

async fn extract_one(
    analyzer: Arc<dyn TextAnalyzer>,
    document: PolicyDocument,
    limit: Duration,
) -> Extraction {
    let requirements = match timeout(limit, analyzer.extract(&document.raw_text)).await {
        Ok(Ok(requirements)) => requirements,
        Ok(Err(e)) => return Extraction::Failed(parse_failure(&document.path, &e)),
        Err(_) => {
            let e = AnalysisError::Timeout(limit.as_millis() as u64);
            return Extraction::Failed(parse_failure(&document.path, &e));
        }
    };

    let classified = timeout(limit, analyzer.classify(&document.raw_text)).await;
    let (classification, warning) = match classified {
        Ok(Ok(classification)) => (Some(classification), None),
        Ok(Err(e)) => (None, Some(classification_warning(&document.path, &e))),
        Err(_) => {
            let e = AnalysisError::Timeout(limit.as_millis() as u64);
            (None, Some(classification_warning(&document.path, &e)))
        }
    };

    debug!(
        "Extracted {} requirements from {}",
        requirements.len(),
        document.path
    );
    let policy = Policy::new(document.path, document.format, document.raw_text, requirements);
    Extraction::Done {
        extracted: ExtractedPolicy { policy, classification },
        warning,
    }
}

fn parse_failure(path: &str, e: &AnalysisError) -> Warning {
    ComplianceError::PolicyParse {
        path: path.to_string(),
        reason: e.to_string(),
    }
    .to_warning(path)
}

fn classification_warning(path: &str, e: &AnalysisError) -> Warning {
    Warning::new(
        WarningKind::PolicyParse,
        path,
        format!("classification unavailable, continuing without it: {}", e),
    )
}

fn merge_into(existing: &mut Rule, other: Rule) {
    existing.severity = existing.severity.max(other.severity);
    existing.source_policy_ids.extend(other.source_policy_ids);
    existing.obligations.extend(other.obligations);
    existing.applicable_file_types.extend(other.applicable_file_types);
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use compli_core::{DocumentFormat, ExtractedRequirement, Severity};
    use mockall::mock;
    use std::collections::BTreeSet;

    mock! {
        pub Analyzer {}

        #[async_trait]
        impl TextAnalyzer for Analyzer {
            async fn extract(&self, text: &str) -> Result<Vec<ExtractedRequirement>, AnalysisError>;
            async fn classify(&self, text: &str) -> Result<Classification, AnalysisError>;
        }
    }

    fn doc(path: &str, text: &str) -> PolicyDocument {
        PolicyDocument {
            path: path.to_string(),
            format: DocumentFormat::Text,
            raw_text: text.to_string(),
        }
    }

    /// Analyzer that tags each sentence with the category named in brackets,
    /// e.g. "[encryption] Data must be encrypted." Text containing "FAIL" errors.
    fn bracket_analyzer() -> MockAnalyzer {
        let mut mock = MockAnalyzer::new();
        mock.expect_extract().returning(|text| {
            if text.contains("FAIL") {
                return Err(AnalysisError::Rejected("unparseable".into()));
            }
            Ok(text
                .split('.')
                .filter_map(|s| {
                    let s = s.trim();
                    let rest = s.strip_prefix('[')?;
                    let (category, body) = rest.split_once(']')?;
                    let confidence = if body.contains("maybe") { 0.2 } else { 0.8 };
                    Some(ExtractedRequirement::new(body.trim(), category, confidence))
                })
                .collect())
        });
        mock.expect_classify().returning(|_| {
            Ok(Classification {
                label: "general".into(),
                confidence: 0.9,
            })
        });
        mock
    }

    fn rule_ids(output: &CompileOutput) -> BTreeSet<String> {
        output.rules.rules().iter().map(|r| r.id.clone()).collect()
    }

    fn compiler(mock: MockAnalyzer, config: CompilerConfig) -> PolicyCompiler {
        PolicyCompiler::new(Arc::new(mock), TemplateTable::builtin().unwrap(), config)
    }

    #[tokio::test]
    async fn test_compile_is_deterministic_across_concurrency() {
        let docs = vec![
            doc(
                "a.txt",
                "[encryption] Data must be encrypted. [consent] Tracking should need consent.",
            ),
            doc("b.txt", "[authentication] Passwords must not be stored in code."),
            doc("c.txt", "[retention] Logs should be kept for one year."),
        ];

        let serial_config = CompilerConfig {
            concurrency: 1,
            ..Default::default()
        };
        let parallel_config = CompilerConfig {
            concurrency: 8,
            ..Default::default()
        };
        let serial = compiler(bracket_analyzer(), serial_config)
            .compile(docs.clone(), &CancellationToken::new())
            .await
            .unwrap();
        let parallel = compiler(bracket_analyzer(), parallel_config)
            .compile(docs, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(rule_ids(&serial), rule_ids(&parallel));
        assert_eq!(serial.rules, parallel.rules);
        assert_eq!(serial.rules.len(), 4);
        assert!(!serial.used_builtin);
    }

    #[tokio::test]
    async fn test_rules_merge_across_policies() {
        let docs = vec![
            doc("a.txt", "[encryption] Backups should be encrypted."),
            doc("b.txt", "[encryption] Customer data must be encrypted."),
        ];
        let output = compiler(bracket_analyzer(), CompilerConfig::default())
            .compile(docs, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.rules.len(), 1);
        let rule = &output.rules.rules()[0];
        assert_eq!(rule.category, "encryption");
        assert_eq!(rule.severity, Severity::High);
        assert_eq!(rule.source_policy_ids.len(), 2);
        assert_eq!(rule.obligations.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_policy_is_skipped_with_warning() {
        let docs = vec![
            doc("bad.txt", "FAIL this document"),
            doc("good.txt", "[security] Secrets must never be committed."),
        ];
        let output = compiler(bracket_analyzer(), CompilerConfig::default())
            .compile(docs, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.policies_processed, 1);
        assert_eq!(output.policies_skipped, 1);
        assert_eq!(output.rules.len(), 1);
        assert!(output
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::PolicyParse && w.subject == "bad.txt"));
    }

    #[tokio::test]
    async fn test_low_confidence_and_unmapped_are_warned() {
        let docs = vec![doc(
            "a.txt",
            "[encryption] maybe encrypt things. [liability] Damages must be capped.",
        )];
        let output = compiler(bracket_analyzer(), CompilerConfig::default())
            .compile(docs, &CancellationToken::new())
            .await
            .unwrap();

        let kinds: Vec<WarningKind> = output.warnings.iter().map(|w| w.kind).collect();
        assert!(kinds.contains(&WarningKind::LowConfidence));
        assert!(kinds.contains(&WarningKind::UnmappedCategory));
        assert!(kinds.contains(&WarningKind::RuleCompilationDeficiency));
        assert!(output.used_builtin);
        assert_eq!(output.rules, builtin_rules());
    }

    #[tokio::test]
    async fn test_exhausted_without_fallback() {
        let config = CompilerConfig {
            fallback_to_builtin: false,
            ..Default::default()
        };
        let err = compiler(bracket_analyzer(), config)
            .compile(vec![doc("bad.txt", "FAIL")], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ComplianceError::PipelineExhausted));
    }

    #[tokio::test]
    async fn test_classification_fallback_category() {
        let mut mock = MockAnalyzer::new();
        mock.expect_extract().returning(|_| {
            Ok(vec![ExtractedRequirement::new("Users must opt in.", "general", 0.9)])
        });
        mock.expect_classify().returning(|_| {
            Ok(Classification {
                label: "consent".into(),
                confidence: 0.7,
            })
        });

        let output = compiler(mock, CompilerConfig::default())
            .compile(vec![doc("privacy.md", "Users must opt in.")], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.rules.rules()[0].category, "consent");
    }

    #[tokio::test]
    async fn test_duplicates_and_unsupported_formats_skipped() {
        let pdf = PolicyDocument {
            path: "gdpr.pdf".into(),
            format: DocumentFormat::Pdf,
            raw_text: String::new(),
        };
        let docs = vec![
            doc("b.txt", "[encryption] Data must be encrypted."),
            doc("a.txt", "[encryption] Data must be encrypted."),
            pdf,
        ];
        let output = compiler(bracket_analyzer(), CompilerConfig::default())
            .compile(docs, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.policies_processed, 1);
        assert_eq!(output.policies_skipped, 2);
        let dup = output
            .warnings
            .iter()
            .find(|w| w.kind == WarningKind::DuplicatePolicy)
            .unwrap();
        assert_eq!(dup.subject, "b.txt");
        assert!(output
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::UnsupportedDocumentFormat));
    }

    /// Analyzer that never answers for documents containing "SLOW".
    struct SlowAnalyzer;

    #[async_trait]
    impl TextAnalyzer for SlowAnalyzer {
        async fn extract(&self, text: &str) -> Result<Vec<ExtractedRequirement>, AnalysisError> {
            if text.contains("SLOW") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(vec![ExtractedRequirement::new(text, "authentication", 0.9)])
        }

        async fn classify(&self, _text: &str) -> Result<Classification, AnalysisError> {
            Err(AnalysisError::Unavailable("not needed".into()))
        }
    }

    #[tokio::test]
    async fn test_extraction_timeout_skips_policy() {
        let config = CompilerConfig {
            extraction_timeout_ms: 50,
            ..Default::default()
        };
        let docs = vec![
            doc("slow.txt", "SLOW policy that must time out."),
            doc("fast.txt", "Passwords must not be stored in code."),
        ];
        let table = TemplateTable::builtin().unwrap();
        let compiler = PolicyCompiler::new(Arc::new(SlowAnalyzer), table, config);
        let output = compiler.compile(docs, &CancellationToken::new()).await.unwrap();

        assert_eq!(output.policies_processed, 1);
        assert_eq!(output.policies_skipped, 1);
        assert!(!output.used_builtin);
        assert_eq!(output.rules.len(), 1);
        assert_eq!(output.rules.rules()[0].category, "authentication");
        let timed_out = output
            .warnings
            .iter()
            .find(|w| w.kind == WarningKind::PolicyParse && w.subject == "slow.txt")
            .unwrap();
        assert!(timed_out.message.contains(&AnalysisError::Timeout(50).to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_without_fallback_is_not_exhausted() {
        let config = CompilerConfig {
            fallback_to_builtin: false,
            ..Default::default()
        };
        let token = CancellationToken::new();
        token.cancel();
        let output = compiler(bracket_analyzer(), config)
            .compile(vec![doc("a.txt", "[encryption] Data must be encrypted.")], &token)
            .await
            .unwrap();

        assert!(output.cancelled);
        assert!(output.rules.is_empty());
        assert!(!output.used_builtin);
        assert_eq!(output.policies_skipped, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let output = compiler(bracket_analyzer(), CompilerConfig::default())
            .compile(vec![doc("a.txt", "[encryption] Data must be encrypted.")], &token)
            .await
            .unwrap();

        assert!(output.cancelled);
        assert_eq!(output.policies_processed, 0);
        assert!(output.used_builtin);
    }
}
