//! Scan targets: the root of a tree plus its exclusions.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use compli_core::{ComplianceError, ComplianceResult, ScanLimits};

/// One enumerated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// A file within the size ceiling.
    File {
        path: PathBuf,
        /// Relative to the root, `/`-separated
        relative: String,
        size: u64,
    },
    /// A file over `max_file_bytes`; recorded as skipped, never read.
    Oversized { relative: String, size: u64 },
    /// A directory entry that could not be inspected.
    Unreadable { relative: String, reason: String },
}

impl Candidate {
    pub fn relative(&self) -> &str {
        match self {
            Candidate::File { relative, .. }
            | Candidate::Oversized { relative, .. }
            | Candidate::Unreadable { relative, .. } => relative,
        }
    }
}

/// A filesystem tree to scan, with its exclusions resolved.
///
/// The file list is enumerated lazily, in file-name order, every time
/// [`ScanTarget::files`] is called.
#[derive(Debug, Clone)]
pub struct ScanTarget {
    root: PathBuf,
    max_file_bytes: u64,
    excluded_dirs: Vec<String>,
    binary_extensions: Vec<String>,
    exclude_globs: Vec<Pattern>,
}

impl ScanTarget {
    pub fn new(root: impl Into<PathBuf>, limits: &ScanLimits) -> ComplianceResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ComplianceError::FileAccess {
                path: root.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let exclude_globs = limits
            .exclude_globs
            .iter()
            .map(|g| {
                Pattern::new(g).map_err(|e| {
                    ComplianceError::InvalidConfiguration(format!(
                        "invalid exclude glob '{}': {}",
                        g, e
                    ))
                })
            })
            .collect::<ComplianceResult<Vec<_>>>()?;

        debug!("Scan target {} ({} exclude globs)", root.display(), exclude_globs.len());

        Ok(Self {
            root,
            max_file_bytes: limits.max_file_bytes,
            excluded_dirs: limits.excluded_dirs.clone(),
            binary_extensions: limits
                .binary_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            exclude_globs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily enumerate candidate files.
    ///
    /// Excluded directories, binary extensions and glob-excluded paths are
    /// dropped silently; oversized and unreadable entries are yielded so the
    /// scanner can count them.
    pub fn files(&self) -> impl Iterator<Item = Candidate> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.is_excluded_dir(entry))
            .filter_map(move |entry| match entry {
                Ok(entry) => self.candidate(&entry),
                Err(e) => {
                    let relative = e
                        .path()
                        .map(|p| self.relative(p))
                        .unwrap_or_else(|| self.root.display().to_string());
                    Some(Candidate::Unreadable {
                        relative,
                        reason: e.to_string(),
                    })
                }
            })
    }

    /// `/`-separated path relative to the root.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if self.excluded_dirs.iter().any(|d| *d == name) {
            return true;
        }
        self.is_glob_excluded(&self.relative(entry.path()))
    }

    fn is_glob_excluded(&self, relative: &str) -> bool {
        self.exclude_globs.iter().any(|g| g.matches(relative))
    }

    fn candidate(&self, entry: &DirEntry) -> Option<Candidate> {
        if !entry.file_type().is_file() {
            return None;
        }
        let relative = self.relative(entry.path());

        let binary = entry
            .path()
            .extension()
            .map(|ext| self.binary_extensions.contains(&ext.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or(false);
        if binary || self.is_glob_excluded(&relative) {
            return None;
        }

        match entry.metadata() {
            Ok(meta) if meta.len() > self.max_file_bytes => Some(Candidate::Oversized {
                relative,
                size: meta.len(),
            }),
            Ok(meta) => Some(Candidate::File {
                path: entry.path().to_path_buf(),
                relative,
                size: meta.len(),
            }),
            Err(e) => Some(Candidate::Unreadable {
                relative,
                reason: e.to_string(),
            }),
        }
    }
}
