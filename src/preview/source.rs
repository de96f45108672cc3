use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::models::PreviewId;
use super::workspace::WorkspaceManager;
use crate::errors::PreviewError;

/// Version-control operations needed to pin a working tree at a reference.
/// Real implementation: `GitSource`. Test double: `FakeFetcher`.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Clone only `reference` with a history depth of one.
    async fn shallow_clone(&self, url: &str, reference: &str, dest: &Path) -> Result<()>;

    /// Clone the default history.
    async fn full_clone(&self, url: &str, dest: &Path) -> Result<()>;

    /// Check out `reference` in an existing clone.
    async fn checkout(&self, dest: &Path, reference: &str) -> Result<()>;

    /// Commit id of HEAD after acquisition, if it can be determined.
    async fn head_commit(&self, dest: &Path) -> Result<String>;
}

/// Build the clone URL for `owner/repo` under `base_url`.
pub fn repo_url(base_url: &str, owner: &str, repo: &str) -> String {
    format!("{}/{}/{}.git", base_url.trim_end_matches('/'), owner, repo)
}

/// `git` CLI for network operations, `git2` for reading the result.
pub struct GitSource {
    git_cmd: String,
}

impl GitSource {
    pub fn new(git_cmd: impl Into<String>) -> Self {
        Self {
            git_cmd: git_cmd.into(),
        }
    }

    async fn run_git(&self, args: &[&str]) -> Result<()> {
        tracing::debug!(cmd = %self.git_cmd, ?args, "running git");
        let output = tokio::process::Command::new(&self.git_cmd)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.git_cmd))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "git {} exited with {}: {}",
                args.first().copied().unwrap_or_default(),
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

impl Default for GitSource {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl SourceFetcher for GitSource {
    async fn shallow_clone(&self, url: &str, reference: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        self.run_git(&[
            "clone",
            "--depth",
            "1",
            "--single-branch",
            "--branch",
            reference,
            "--",
            url,
            &dest,
        ])
        .await
    }

    async fn full_clone(&self, url: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        self.run_git(&["clone", "--", url, &dest]).await
    }

    async fn checkout(&self, dest: &Path, reference: &str) -> Result<()> {
        let dest = dest.to_string_lossy();
        self.run_git(&["-C", &dest, "checkout", "--quiet", reference, "--"])
            .await
    }

    async fn head_commit(&self, dest: &Path) -> Result<String> {
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<String> {
            let repo = git2::Repository::open(&dest)
                .with_context(|| format!("Failed to open repository at {}", dest.display()))?;
            let commit = repo
                .head()
                .context("Repository has no HEAD")?
                .peel_to_commit()
                .context("HEAD does not point at a commit")?;
            Ok(commit.id().to_string())
        })
        .await
        .context("HEAD lookup task failed")?
    }
}

/// Result of a successful acquisition.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub path: PathBuf,
    /// Whether the shallow single-branch clone succeeded without fallback.
    pub shallow: bool,
    pub head_sha: Option<String>,
    pub logs: Vec<String>,
}

/// Prepare a clean workspace for `id` and fetch `reference` into it.
///
/// Tries a shallow clone restricted to the reference first. If that is
/// rejected (a commit SHA, an unknown tag) the workspace is recreated and a
/// full clone followed by an explicit checkout is attempted, once.
pub async fn acquire(
    fetcher: &dyn SourceFetcher,
    workspaces: &WorkspaceManager,
    id: &PreviewId,
    url: &str,
    reference: &str,
) -> Result<Acquired, PreviewError> {
    let path = workspaces.prepare(id).await?;
    let mut logs = Vec::new();

    let shallow = match fetcher.shallow_clone(url, reference, &path).await {
        Ok(()) => {
            logs.push(format!("shallow clone of {} at {}", url, reference));
            true
        }
        Err(shallow_err) => {
            tracing::info!(
                id = %id,
                reference,
                error = %format!("{:#}", shallow_err),
                "shallow clone rejected, falling back to full clone"
            );
            logs.push(format!(
                "shallow clone at {} failed, retrying with full clone",
                reference
            ));

            let path = workspaces.prepare(id).await?;
            fetcher
                .full_clone(url, &path)
                .await
                .map_err(|e| PreviewError::Acquisition {
                    reference: reference.to_string(),
                    message: format!("{:#}", e),
                })?;
            fetcher
                .checkout(&path, reference)
                .await
                .map_err(|e| PreviewError::Acquisition {
                    reference: reference.to_string(),
                    message: format!("{:#}", e),
                })?;
            logs.push(format!("full clone of {} checked out at {}", url, reference));
            false
        }
    };

    let head_sha = match fetcher.head_commit(&path).await {
        Ok(sha) => Some(sha),
        Err(e) => {
            tracing::warn!(id = %id, error = %format!("{:#}", e), "could not resolve HEAD");
            None
        }
    };

    Ok(Acquired {
        path,
        shallow,
        head_sha,
        logs,
    })
}
