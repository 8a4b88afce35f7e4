// ABOUTME: Source control access for materializing release checkouts.
// ABOUTME: Shells out to git against the app's bare repository.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

use crate::types::{AppName, Revision, RevisionError};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("unknown revision {0}")]
    UnknownRevision(String),

    #[error(transparent)]
    Revision(#[from] RevisionError),
}

/// Resolves pushed revisions and writes their trees to disk.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Resolve a full or abbreviated revision to its short form.
    async fn resolve(&self, app: &AppName, rev: &str) -> Result<Revision, SourceError>;

    /// Write the tree of `rev` into `dest`, creating it if needed.
    async fn checkout(&self, app: &AppName, rev: &Revision, dest: &Path)
    -> Result<(), SourceError>;
}

/// Git bare repositories under one root (`/var/repo/<app>.git`).
#[derive(Debug, Clone)]
pub struct GitRepositories {
    root: PathBuf,
}

impl GitRepositories {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn git_dir(&self, app: &AppName) -> PathBuf {
        self.root.join(format!("{}.git", app))
    }

    async fn git(
        &self,
        app: &AppName,
        work_tree: Option<&Path>,
        args: &[&str],
    ) -> Result<String, SourceError> {
        let git_dir = self.git_dir(app);
        tracing::debug!(git_dir = %git_dir.display(), ?args, "running git");

        let mut cmd = Command::new("git");
        cmd.arg("--git-dir").arg(&git_dir);
        if let Some(work_tree) = work_tree {
            cmd.arg("--work-tree").arg(work_tree);
        }
        let output = cmd.args(args).output().await?;

        if !output.status.success() {
            return Err(SourceError::Git {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl SourceControl for GitRepositories {
    async fn resolve(&self, app: &AppName, rev: &str) -> Result<Revision, SourceError> {
        let spec = format!("{}^{{commit}}", rev);
        let full = self
            .git(app, None, &["rev-parse", "--verify", "--quiet", &spec])
            .await
            .map_err(|_| SourceError::UnknownRevision(rev.to_string()))?;
        Ok(Revision::abbreviate(&full)?)
    }

    async fn checkout(
        &self,
        app: &AppName,
        rev: &Revision,
        dest: &Path,
    ) -> Result<(), SourceError> {
        tokio::fs::create_dir_all(dest).await?;
        self.git(app, Some(dest), &["checkout", "-f", rev.as_str(), "--", "."])
            .await?;
        tracing::info!(app = %app, revision = %rev, dest = %dest.display(), "checked out");
        Ok(())
    }
}
