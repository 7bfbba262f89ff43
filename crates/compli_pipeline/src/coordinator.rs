//! Pipeline coordinator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use compli_compiler::{builtin_rules, CompileOutput, PolicyCompiler, TemplateTable};
use compli_core::{
    CancellationToken, ComplianceConfig, ComplianceError, DocumentLoader, PolicyDocument, RuleSet,
    ScanLimits, ScanStats, TextAnalyzer, Warning,
};
use compli_scanner::{RepositoryScanner, ScanTarget};
use compli_scorer::{Report, RiskScorer};

use crate::error::{PipelineError, PipelineResult};
use crate::git::{self, Checkout, DEFAULT_CLONE_TIMEOUT};
use crate::ruleset::{RuleSetFile, RuleSetRef};
use crate::stage::StageTracker;

/// Outcome of importing a policy folder.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub rules_compiled: usize,
    pub warnings: Vec<Warning>,
    pub policies_processed: usize,
    pub policies_skipped: usize,
    pub used_builtin: bool,
    pub table_version: u32,
    #[serde(skip)]
    pub rules: RuleSet,
}

impl ImportSummary {
    /// Persistable form of the compiled rules.
    pub fn rule_set_file(&self) -> RuleSetFile {
        RuleSetFile::new(self.table_version, &self.rules)
    }
}

/// Documents read during INGEST, plus what could not be read.
struct Ingested {
    documents: Vec<PolicyDocument>,
    warnings: Vec<Warning>,
    skipped: usize,
}

/// Rules resolved during INGEST, before compilation.
enum RuleSource {
    Builtin,
    Loaded(RuleSet),
    Documents(Ingested),
}

/// Single entry point for the API and CLI layers.
///
/// The text-analysis capability and the document loader are injected here and
/// never reached through global state.
pub struct Coordinator {
    analyzer: Arc<dyn TextAnalyzer>,
    loader: Arc<dyn DocumentLoader>,
    table: TemplateTable,
    config: ComplianceConfig,
    scanner: RepositoryScanner,
    clone_timeout: Duration,
}

impl Coordinator {
    /// Coordinator using the built-in template table.
    pub fn new(
        analyzer: Arc<dyn TextAnalyzer>,
        loader: Arc<dyn DocumentLoader>,
        config: ComplianceConfig,
    ) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            analyzer,
            loader,
            table: TemplateTable::builtin()?,
            config,
            scanner: RepositoryScanner::new(),
            clone_timeout: DEFAULT_CLONE_TIMEOUT,
        })
    }

    pub fn with_templates(mut self, table: TemplateTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_scanner(mut self, scanner: RepositoryScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_clone_timeout(mut self, limit: Duration) -> Self {
        self.clone_timeout = limit;
        self
    }

    pub fn config(&self) -> &ComplianceConfig {
        &self.config
    }

    pub fn table(&self) -> &TemplateTable {
        &self.table
    }

    /// Compile every policy document under `folder`.
    pub async fn import_policies(
        &self,
        folder: &Path,
        cancel: &CancellationToken,
    ) -> PipelineResult<ImportSummary> {
        let mut tracker = StageTracker::new();
        let ingested = self.ingest(folder)?;
        tracker.advance();
        let mut output = self.compile(ingested, cancel, &mut tracker).await?;
        output.warnings.sort();

        info!(
            "Imported {} policies into {} rules ({} warnings)",
            output.policies_processed,
            output.rules.len(),
            output.warnings.len()
        );

        Ok(ImportSummary {
            rules_compiled: output.rules.len(),
            warnings: output.warnings,
            policies_processed: output.policies_processed,
            policies_skipped: output.policies_skipped,
            used_builtin: output.used_builtin,
            table_version: self.table.version,
            rules: output.rules,
        })
    }

    /// Scan a local path or git URL and produce a scored report.
    ///
    /// Fails before INGEST completes for an unusable target or rule-set file,
    /// and with [`PipelineError::Exhausted`] when no rule is left to scan with.
    /// Every other problem ends up as a warning in `report.stats`.
    pub async fn scan_repository(
        &self,
        target: &str,
        rule_set: &RuleSetRef,
        limits: &ScanLimits,
        cancel: &CancellationToken,
    ) -> PipelineResult<Report> {
        let mut tracker = StageTracker::new();

        // The checkout must outlive the scan.
        let (root, _checkout) = self.resolve_target(target).await?;
        let scan_target = ScanTarget::new(&root, limits)?;
        let source = match rule_set {
            RuleSetRef::Builtin => RuleSource::Builtin,
            RuleSetRef::File(path) => RuleSource::Loaded(RuleSetFile::load(path)?.rule_set()),
            RuleSetRef::Policies(folder) => RuleSource::Documents(self.ingest(folder)?),
        };

        tracker.advance();
        let mut stats = ScanStats::default();
        let rules = match source {
            RuleSource::Builtin => builtin_rules(),
            RuleSource::Loaded(rules) if rules.active().next().is_some() => rules,
            RuleSource::Loaded(_) => self.fallback(&mut stats, &mut tracker)?,
            RuleSource::Documents(ingested) => {
                let output = self.compile(ingested, cancel, &mut tracker).await?;
                stats.policies_processed = output.policies_processed;
                stats.policies_skipped = output.policies_skipped;
                stats.cancelled = output.cancelled;
                stats.warnings = output.warnings;
                output.rules
            }
        };

        tracker.advance();
        let output = self.scanner.scan(&scan_target, &rules, limits, cancel).await;
        stats.absorb(output.stats);
        stats.warnings.sort();

        tracker.advance();
        let scorer = RiskScorer::new(self.config.scoring.clone());
        let report = scorer.score(output.violations, &rules, stats);

        tracker.advance();
        info!(
            "Scan of {} complete: score {:.3}, {} violations, {} warnings",
            target,
            report.compliance_score,
            report.scan_summary.total_violations,
            report.stats.warnings.len()
        );
        Ok(report)
    }

    async fn resolve_target(&self, target: &str) -> PipelineResult<(PathBuf, Option<Checkout>)> {
        if git::is_remote(target) {
            let checkout = git::shallow_clone(target, self.clone_timeout).await?;
            return Ok((checkout.root().to_path_buf(), Some(checkout)));
        }
        let path = PathBuf::from(target);
        if !path.is_dir() {
            return Err(PipelineError::InvalidTarget(format!(
                "{} is neither a directory nor a git URL",
                target
            )));
        }
        Ok((path, None))
    }

    /// INGEST: discover and load policy documents. Documents that cannot be
    /// loaded are skipped with a warning.
    fn ingest(&self, folder: &Path) -> PipelineResult<Ingested> {
        let paths = self.loader.discover(folder)?;
        let mut ingested = Ingested {
            documents: Vec::with_capacity(paths.len()),
            warnings: Vec::new(),
            skipped: 0,
        };

        for path in paths {
            match self.loader.load(&path) {
                Ok(document) => ingested.documents.push(document),
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping policy {}: {}", path.display(), e);
                    ingested.warnings.push(e.to_warning(path.display().to_string()));
                    ingested.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            "Ingested {} policy documents from {} ({} skipped)",
            ingested.documents.len(),
            folder.display(),
            ingested.skipped
        );
        Ok(ingested)
    }

    /// COMPILE_RULES for ingested documents.
    async fn compile(
        &self,
        ingested: Ingested,
        cancel: &CancellationToken,
        tracker: &mut StageTracker,
    ) -> PipelineResult<CompileOutput> {
        let compiler = PolicyCompiler::new(
            Arc::clone(&self.analyzer),
            self.table.clone(),
            self.config.compiler.clone(),
        );
        match compiler.compile(ingested.documents, cancel).await {
            Ok(mut output) => {
                output.warnings.extend(ingested.warnings);
                output.policies_skipped += ingested.skipped;
                Ok(output)
            }
            Err(ComplianceError::PipelineExhausted) => {
                tracker.fail("no usable rules and no built-in fallback");
                Err(PipelineError::Exhausted)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Built-in rules for a persisted set with no active rule, when allowed.
    fn fallback(
        &self,
        stats: &mut ScanStats,
        tracker: &mut StageTracker,
    ) -> PipelineResult<RuleSet> {
        if !self.config.compiler.fallback_to_builtin {
            tracker.fail("persisted rule set has no active rules");
            return Err(PipelineError::Exhausted);
        }
        let deficiency = ComplianceError::RuleCompilationDeficiency(
            "rule set has no active rules; using built-in rule set".into(),
        );
        warn!("{}", deficiency);
        stats.warnings.push(deficiency.to_warning("rules"));
        Ok(builtin_rules())
    }
}
