//! Filesystem policy loader.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use compli_core::{
    ComplianceError, ComplianceResult, DocumentFormat, DocumentLoader, PolicyDocument,
};

/// Loads `.txt` and `.md` policies; PDF and Word files are discovered but
/// rejected as unsupported.
#[derive(Debug, Clone, Default)]
pub struct FsDocumentLoader;

impl FsDocumentLoader {
    pub fn new() -> Self {
        Self
    }
}

fn format_of(path: &Path) -> Option<DocumentFormat> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentFormat::from_extension)
}

impl DocumentLoader for FsDocumentLoader {
    fn discover(&self, folder: &Path) -> ComplianceResult<Vec<PathBuf>> {
        if !folder.is_dir() {
            return Err(ComplianceError::FileAccess {
                path: folder.display().to_string(),
                reason: "policy folder not found".to_string(),
            });
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(folder).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", folder.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() && format_of(entry.path()).is_some() {
                found.push(entry.into_path());
            }
        }

        debug!("Discovered {} policy documents in {}", found.len(), folder.display());
        Ok(found)
    }

    fn load(&self, path: &Path) -> ComplianceResult<PolicyDocument> {
        let display = path.display().to_string();
        let format = format_of(path).ok_or_else(|| ComplianceError::UnsupportedDocumentFormat {
            path: display.clone(),
            format: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "none".to_string()),
        })?;

        if !format.is_supported() {
            return Err(ComplianceError::UnsupportedDocumentFormat {
                path: display,
                format: format.as_str().to_string(),
            });
        }

        let raw_text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => ComplianceError::PolicyParse {
                path: display.clone(),
                reason: "not valid UTF-8".to_string(),
            },
            _ => ComplianceError::FileAccess {
                path: display.clone(),
                reason: e.to_string(),
            },
        })?;

        Ok(PolicyDocument {
            path: display,
            format,
            raw_text,
        })
    }
}
