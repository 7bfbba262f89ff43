//! Integration tests for the pipeline coordinator.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use tempfile::tempdir;

use compli_analysis::{FsDocumentLoader, KeywordAnalyzer};
use compli_core::{
    AnalysisError, CancellationToken, Classification, ComplianceConfig, DetectionPattern,
    ExtractedRequirement, Rule, RuleSet, ScanLimits, Severity, TextAnalyzer, WarningKind,
};
use compli_pipeline::{Coordinator, PipelineError, RuleSetFile, RuleSetRef};
use compli_scorer::{ReportStatus, RiskLevel};

mock! {
    pub Analyzer {}

    #[async_trait]
    impl TextAnalyzer for Analyzer {
        async fn extract(&self, text: &str) -> Result<Vec<ExtractedRequirement>, AnalysisError>;
        async fn classify(&self, text: &str) -> Result<Classification, AnalysisError>;
    }
}

/// "[category] sentence." becomes one requirement; documents containing FAIL are rejected.
fn bracket_analyzer() -> MockAnalyzer {
    let mut mock = MockAnalyzer::new();
    mock.expect_extract().returning(|text| {
        if text.contains("FAIL") {
            return Err(AnalysisError::Unavailable("model offline".into()));
        }
        Ok(text
            .split('.')
            .filter_map(|s| {
                let rest = s.trim().strip_prefix('[')?;
                let (category, body) = rest.split_once(']')?;
                Some(ExtractedRequirement::new(body.trim(), category, 0.9))
            })
            .collect())
    });
    mock.expect_classify().returning(|_| {
        Ok(Classification {
            label: "general".into(),
            confidence: 0.1,
        })
    });
    mock
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn coordinator(analyzer: impl TextAnalyzer + 'static, config: ComplianceConfig) -> Coordinator {
    Coordinator::new(Arc::new(analyzer), Arc::new(FsDocumentLoader::new()), config).unwrap()
}

fn api_key_rule_file(dir: &Path) -> std::path::PathBuf {
    let rules = RuleSet::from_rules(vec![Rule::builder("security", "Hardcoded API key")
        .severity(Severity::High)
        .pattern(DetectionPattern::literal("API_KEY =", "Load API keys from the environment"))
        .build(1)]);
    let path = dir.join("rules.json");
    RuleSetFile::new(1, &rules).save(&path).unwrap();
    path
}

#[tokio::test]
async fn test_secrets_scenario() {
    let repo = tempdir().unwrap();
    let state = tempdir().unwrap();
    write(repo.path(), "secrets.py", "API_KEY = 'abcd'\n");
    let rules = api_key_rule_file(state.path());

    let report = coordinator(bracket_analyzer(), ComplianceConfig::default())
        .scan_repository(
            repo.path().to_str().unwrap(),
            &RuleSetRef::File(rules),
            &ScanLimits::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.violations.len(), 1);
    let v = &report.violations[0];
    assert_eq!(v.violation.file_path, "secrets.py");
    assert_eq!(v.violation.severity, Severity::High);
    assert_eq!(v.category, "security");
    assert_eq!(v.suggestion, "Load API keys from the environment");
    assert!(report.compliance_score <= 0.8);
    // critical override: a confident HIGH match is never LOW risk
    assert_eq!(report.risk_level, RiskLevel::Medium);
    assert_eq!(report.status, ReportStatus::Completed);
    assert_eq!(report.scan_summary.total_files_scanned, 1);
    assert_eq!(report.stats.rules_applied, 1);
}

#[tokio::test]
async fn test_empty_repository_with_builtin_rules() {
    let repo = tempdir().unwrap();

    let report = coordinator(bracket_analyzer(), ComplianceConfig::default())
        .scan_repository(
            repo.path().to_str().unwrap(),
            &RuleSetRef::Builtin,
            &ScanLimits::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.violations.is_empty());
    assert_eq!(report.compliance_score, 1.0);
    assert_eq!(report.risk_level, RiskLevel::Low);
    assert_eq!(report.stats.files_scanned, 0);
}

#[tokio::test]
async fn test_failed_policy_does_not_fail_the_run() {
    let repo = tempdir().unwrap();
    let policies = tempdir().unwrap();
    write(repo.path(), "app.py", "password = \"admin123\"\n");
    write(repo.path(), "LICENSE", "MIT\n");
    write(policies.path(), "bad.txt", "FAIL to parse this one.");
    write(policies.path(), "good.md", "[authentication] Passwords must never be hardcoded.");

    let report = coordinator(bracket_analyzer(), ComplianceConfig::default())
        .scan_repository(
            repo.path().to_str().unwrap(),
            &RuleSetRef::Policies(policies.path().to_path_buf()),
            &ScanLimits::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.stats.policies_processed, 1);
    assert_eq!(report.stats.policies_skipped, 1);
    assert!(report
        .stats
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::PolicyParse && w.subject.ends_with("bad.txt")));
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].category, "authentication");
    assert_eq!(report.violations[0].violation.line_number, Some(1));
}

#[tokio::test]
async fn test_exhausted_without_fallback() {
    let repo = tempdir().unwrap();
    let policies = tempdir().unwrap();
    write(repo.path(), "app.py", "x = 1\n");
    write(policies.path(), "bad.txt", "FAIL entirely.");

    let mut config = ComplianceConfig::default();
    config.compiler.fallback_to_builtin = false;
    let err = coordinator(bracket_analyzer(), config)
        .scan_repository(
            repo.path().to_str().unwrap(),
            &RuleSetRef::Policies(policies.path().to_path_buf()),
            &ScanLimits::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Exhausted));
    assert!(err.is_failed_run());
}

#[tokio::test]
async fn test_builtin_fallback_when_nothing_compiles() {
    let repo = tempdir().unwrap();
    let policies = tempdir().unwrap();
    write(repo.path(), "config.py", "api_key = 'hunter22'\n");
    write(policies.path(), "bad.txt", "FAIL entirely.");

    let report = coordinator(bracket_analyzer(), ComplianceConfig::default())
        .scan_repository(
            repo.path().to_str().unwrap(),
            &RuleSetRef::Policies(policies.path().to_path_buf()),
            &ScanLimits::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report
        .stats
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::RuleCompilationDeficiency));
    let categories: Vec<&str> = report.violations.iter().map(|v| v.category.as_str()).collect();
    assert_eq!(categories, vec!["licensing", "security"]);
}

#[tokio::test]
async fn test_report_is_identical_across_concurrency() {
    let repo = tempdir().unwrap();
    let policies = tempdir().unwrap();
    for i in 0..12 {
        write(
            repo.path(),
            &format!("svc/handler_{:02}.py", i),
            "import md5\npassword = 'letmein'\nlogger.info(f'token={token}')\n",
        );
    }
    write(
        policies.path(),
        "a.txt",
        "[encryption] Hashes must be strong. [audit-logging] Logs must not leak secrets.",
    );
    write(policies.path(), "b.txt", "[authentication] Passwords must not be embedded.");
    write(policies.path(), "c.txt", "[retention] Data shall expire.");

    let run = |concurrency: usize| {
        let mut config = ComplianceConfig::default();
        config.compiler.concurrency = concurrency;
        let limits = ScanLimits::default().with_concurrency(concurrency);
        let coordinator = coordinator(bracket_analyzer(), config);
        let repo = repo.path().to_str().unwrap().to_string();
        let policies = policies.path().to_path_buf();
        async move {
            coordinator
                .scan_repository(
                    &repo,
                    &RuleSetRef::Policies(policies),
                    &limits,
                    &CancellationToken::new(),
                )
                .await
                .unwrap()
        }
    };

    let serial = run(1).await;
    let parallel = run(8).await;
    assert!(!serial.violations.is_empty());
    assert_eq!(
        serde_json::to_string(&serial).unwrap(),
        serde_json::to_string(&parallel).unwrap()
    );
}

#[tokio::test]
async fn test_import_then_scan_with_persisted_rules() {
    let repo = tempdir().unwrap();
    let policies = tempdir().unwrap();
    let state = tempdir().unwrap();
    write(repo.path(), "LICENSE", "MIT\n");
    write(
        repo.path(),
        "web/app.js",
        "import { track } from 'analytics';\nfetch('http://api.example.com');\n",
    );
    write(
        policies.path(),
        "privacy.md",
        "# Privacy\n\nTracking cookies must only be set after the user gives consent.\n\
         All traffic must be encrypted with TLS.\n",
    );
    write(policies.path(), "scanned.pdf", "%PDF-1.7");

    let coordinator = coordinator(KeywordAnalyzer::new(), ComplianceConfig::default());
    let summary = coordinator
        .import_policies(policies.path(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.rules_compiled, 2);
    assert_eq!(summary.policies_processed, 1);
    assert_eq!(summary.policies_skipped, 1);
    assert!(!summary.used_builtin);
    assert!(summary.warnings.iter().any(|w| {
        w.kind == WarningKind::UnsupportedDocumentFormat && w.subject.ends_with("scanned.pdf")
    }));

    let rules_path = state.path().join("rules.json");
    summary.rule_set_file().save(&rules_path).unwrap();

    let from_file = coordinator
        .scan_repository(
            repo.path().to_str().unwrap(),
            &RuleSetRef::File(rules_path),
            &ScanLimits::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let from_policies = coordinator
        .scan_repository(
            repo.path().to_str().unwrap(),
            &RuleSetRef::Policies(policies.path().to_path_buf()),
            &ScanLimits::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(from_file.violations, from_policies.violations);
    let categories: Vec<&str> = from_file.violations.iter().map(|v| v.category.as_str()).collect();
    assert_eq!(categories, vec!["consent", "encryption"]);
}

#[tokio::test]
async fn test_cancelled_run_returns_partial_report() {
    let repo = tempdir().unwrap();
    write(repo.path(), "a.py", "API_KEY = 'x'\n");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = coordinator(bracket_analyzer(), ComplianceConfig::default())
        .scan_repository(
            repo.path().to_str().unwrap(),
            &RuleSetRef::Builtin,
            &ScanLimits::default(),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.status, ReportStatus::Cancelled);
    assert!(report.stats.cancelled);
    assert!(report.stats.warnings.iter().any(|w| w.kind == WarningKind::Cancelled));
}

#[tokio::test]
async fn test_invalid_targets() {
    let state = tempdir().unwrap();
    let coordinator = coordinator(bracket_analyzer(), ComplianceConfig::default());

    let missing = state.path().join("missing");
    let err = coordinator
        .scan_repository(
            missing.to_str().unwrap(),
            &RuleSetRef::Builtin,
            &ScanLimits::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidTarget(_)));
    assert!(!err.is_failed_run());

    let err = coordinator
        .scan_repository(
            state.path().to_str().unwrap(),
            &RuleSetRef::File(state.path().join("absent.json")),
            &ScanLimits::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::RuleSet { .. }));
}

#[tokio::test]
async fn test_cancelled_compile_without_fallback_is_not_failed() {
    let repo = tempdir().unwrap();
    let policies = tempdir().unwrap();
    write(repo.path(), "app.py", "password = \"admin123\"\n");
    write(policies.path(), "auth.md", "[authentication] Passwords must never be hardcoded.");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut config = ComplianceConfig::default();
    config.compiler.fallback_to_builtin = false;
    let report = coordinator(bracket_analyzer(), config)
        .scan_repository(
            repo.path().to_str().unwrap(),
            &RuleSetRef::Policies(policies.path().to_path_buf()),
            &ScanLimits::default(),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.status, ReportStatus::Cancelled);
    assert!(report.violations.is_empty());
    assert_eq!(report.stats.policies_skipped, 1);
    assert_eq!(report.stats.rules_applied, 0);
}
