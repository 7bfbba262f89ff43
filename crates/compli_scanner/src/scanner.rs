//! Bounded-parallel repository scanning.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use compli_core::{
    CancellationToken, ComplianceError, RuleSet, ScanLimits, ScanStats, Violation, Warning,
    WarningKind,
};

use crate::language::HeuristicRegistry;
use crate::matcher::{check_required_files, compile_rules, match_content_until, CompiledRule};
use crate::target::{Candidate, ScanTarget};

/// Violations and counters of one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    /// Sorted by (file_path, line_number, rule_id)
    pub violations: Vec<Violation>,
    pub stats: ScanStats,
}

enum FileOutcome {
    Scanned(Vec<Violation>),
    Unreadable(String),
    TimedOut,
}

/// Scans a target against a rule set.
#[derive(Debug, Clone)]
pub struct RepositoryScanner {
    registry: Arc<HeuristicRegistry>,
}

impl Default for RepositoryScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryScanner {
    /// Scanner with the built-in language families.
    pub fn new() -> Self {
        Self::with_registry(HeuristicRegistry::builtin())
    }

    pub fn with_registry(registry: HeuristicRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Scan every candidate file of `target`.
    ///
    /// Never fails: unreadable, oversized and timed-out files are counted and
    /// recorded as warnings. On cancellation no new files are dispatched, files
    /// already in flight complete, and the partial result is returned with
    /// `stats.cancelled` set.
    pub async fn scan(
        &self,
        target: &ScanTarget,
        rules: &RuleSet,
        limits: &ScanLimits,
        cancel: &CancellationToken,
    ) -> ScanOutput {
        let (compiled, pattern_warnings) = compile_rules(rules);
        let compiled = Arc::new(compiled);

        let mut stats = ScanStats {
            rules_applied: compiled.len(),
            warnings: pattern_warnings,
            ..ScanStats::default()
        };
        let mut violations = Vec::new();

        info!(
            "Scanning {} with {} rules (concurrency {})",
            target.root().display(),
            compiled.len(),
            limits.concurrency
        );

        let sem = Arc::new(Semaphore::new(limits.concurrency.max(1)));
        let mut join_set = JoinSet::new();
        let per_file_timeout = limits.per_file_timeout();
        let mut dispatched = 0usize;

        for candidate in target.files() {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }

            let (path, relative) = match candidate {
                Candidate::File { path, relative, .. } => (path, relative),
                Candidate::Oversized { relative, size } => {
                    warn!("Skipping oversized file {} ({} bytes)", relative, size);
                    stats.files_skipped += 1;
                    stats.files_oversized += 1;
                    stats.warnings.push(Warning::new(
                        WarningKind::Oversized,
                        relative,
                        format!("{} bytes exceeds limit of {} bytes", size, limits.max_file_bytes),
                    ));
                    continue;
                }
                Candidate::Unreadable { relative, reason } => {
                    record_unreadable(&mut stats, relative, reason);
                    continue;
                }
            };

            if limits.max_files.is_some_and(|max| dispatched >= max) {
                stats.files_truncated += 1;
                continue;
            }
            dispatched += 1;

            let extension = extension_of(&relative);
            let applicable: Vec<usize> = compiled
                .iter()
                .enumerate()
                .filter(|(_, r)| r.has_line_patterns() && r.applies_to(extension.as_deref()))
                .map(|(i, _)| i)
                .collect();
            if applicable.is_empty() {
                stats.files_scanned += 1;
                continue;
            }

            let permit = match sem.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Scan semaphore closed: {}", e);
                    break;
                }
            };
            let compiled = Arc::clone(&compiled);
            let registry = Arc::clone(&self.registry);
            let job = FileJob {
                path,
                relative: relative.clone(),
                extension,
                applicable,
            };
            join_set.spawn(async move {
                let outcome = scan_file(job, compiled, registry, permit, per_file_timeout).await;
                (relative, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((relative, FileOutcome::Scanned(found))) => {
                    debug!("Scanned {} ({} violations)", relative, found.len());
                    stats.files_scanned += 1;
                    violations.extend(found);
                }
                Ok((relative, FileOutcome::Unreadable(reason))) => {
                    record_unreadable(&mut stats, relative, reason);
                }
                Ok((relative, FileOutcome::TimedOut)) => {
                    let err = ComplianceError::ScanTimeout {
                        path: relative.clone(),
                        timeout_ms: limits.per_file_timeout_ms,
                    };
                    warn!("{}", err);
                    stats.files_skipped += 1;
                    stats.files_timed_out += 1;
                    stats.warnings.push(err.to_warning(relative));
                }
                Err(e) => {
                    error!("Scan task failed: {}", e);
                    record_unreadable(&mut stats, "<unknown>".to_string(), e.to_string());
                }
            }
        }

        if stats.files_truncated > 0 {
            warn!("File cap reached: {} files not scanned", stats.files_truncated);
            stats.warnings.push(Warning::new(
                WarningKind::Truncated,
                ".",
                format!(
                    "{} files beyond max_files = {} were not scanned",
                    stats.files_truncated,
                    limits.max_files.unwrap_or_default()
                ),
            ));
        }

        if stats.cancelled {
            warn!("Scan cancelled after {} files", stats.files_scanned);
            stats.warnings.push(Warning::new(
                WarningKind::Cancelled,
                ".",
                "scan cancelled; results are partial",
            ));
        } else if stats.files_scanned > 0 {
            // presence checks only apply to repositories with scannable content
            match check_required_files(&compiled, target.root()) {
                Ok(found) => violations.extend(found),
                Err(e) => {
                    let err = ComplianceError::FileAccess {
                        path: target.root().display().to_string(),
                        reason: e.to_string(),
                    };
                    warn!("{}", err);
                    stats.warnings.push(err.to_warning("."));
                }
            }
        }

        Violation::sort(&mut violations);
        stats.warnings.sort();

        info!(
            "Scan finished: {} violations, {} files scanned, {} skipped",
            violations.len(),
            stats.files_scanned,
            stats.files_skipped
        );

        ScanOutput { violations, stats }
    }
}

struct FileJob {
    path: PathBuf,
    relative: String,
    extension: Option<String>,
    /// Indexes into the compiled rules
    applicable: Vec<usize>,
}

/// Read and match one file on the blocking pool.
///
/// The permit moves into the blocking closure: a file that outlives its
/// timeout keeps its concurrency slot until the matcher reaches its next
/// deadline check.
async fn scan_file(
    job: FileJob,
    compiled: Arc<Vec<CompiledRule>>,
    registry: Arc<HeuristicRegistry>,
    permit: OwnedSemaphorePermit,
    per_file_timeout: Duration,
) -> FileOutcome {
    let deadline = Instant::now() + per_file_timeout;
    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let bytes = match std::fs::read(&job.path) {
            Ok(bytes) => bytes,
            Err(e) => return FileOutcome::Unreadable(e.to_string()),
        };
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => return FileOutcome::Unreadable("not valid UTF-8".to_string()),
        };
        let rules: Vec<&CompiledRule> = job.applicable.iter().map(|&i| &compiled[i]).collect();
        let heuristic = registry.for_extension(job.extension.as_deref());
        match match_content_until(&rules, &job.relative, &content, heuristic, deadline) {
            Some(found) => FileOutcome::Scanned(found),
            None => FileOutcome::TimedOut,
        }
    });

    match timeout(per_file_timeout, handle).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => FileOutcome::Unreadable(format!("scan task failed: {}", e)),
        Err(_) => FileOutcome::TimedOut,
    }
}

fn record_unreadable(stats: &mut ScanStats, relative: String, reason: String) {
    let err = ComplianceError::FileAccess {
        path: relative.clone(),
        reason,
    };
    warn!("{}", err);
    stats.files_skipped += 1;
    stats.files_unreadable += 1;
    stats.warnings.push(err.to_warning(relative));
}

fn extension_of(relative: &str) -> Option<String> {
    Path::new(relative)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}
