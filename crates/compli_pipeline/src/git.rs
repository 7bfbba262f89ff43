//! Remote repository checkout.
//!
//! URL targets are shallow-cloned with the `git` CLI into a temporary
//! directory that lives as long as the returned [`Checkout`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

pub const DEFAULT_CLONE_TIMEOUT: Duration = Duration::from_secs(300);

const REMOTE_PREFIXES: &[&str] = &["http://", "https://", "git@"];

/// Whether a scan target names a remote repository rather than a local path.
pub fn is_remote(target: &str) -> bool {
    REMOTE_PREFIXES.iter().any(|p| target.starts_with(p))
}

/// A cloned working tree, removed when dropped.
#[derive(Debug)]
pub struct Checkout {
    _dir: TempDir,
    root: PathBuf,
}

impl Checkout {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// `git clone --depth 1` of `url`.
pub async fn shallow_clone(url: &str, limit: Duration) -> PipelineResult<Checkout> {
    if !is_remote(url) {
        return Err(PipelineError::InvalidTarget(format!(
            "{} is not a git URL (expected http://, https:// or git@)",
            url
        )));
    }

    let dir = tempfile::Builder::new()
        .prefix("compli-checkout-")
        .tempdir()
        .map_err(|e| {
            PipelineError::Checkout(format!("Failed to create checkout directory: {}", e))
        })?;
    let root = dir.path().join("repo");

    info!("Cloning {} into {}", url, root.display());

    let clone = Command::new("git")
        .args(["clone", "--depth", "1", "--quiet", "--", url])
        .arg(&root)
        .env("GIT_TERMINAL_PROMPT", "0")
        .kill_on_drop(true)
        .output();

    let output = match timeout(limit, clone).await {
        Ok(result) => result
            .map_err(|e| PipelineError::Checkout(format!("Failed to run git clone: {}", e)))?,
        Err(_) => {
            return Err(PipelineError::Checkout(format!(
                "git clone timed out after {}s",
                limit.as_secs()
            )))
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::Checkout(format!("git clone failed: {}", stderr.trim())));
    }

    debug!("Clone of {} complete", url);
    Ok(Checkout { _dir: dir, root })
}
