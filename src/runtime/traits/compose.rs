// ABOUTME: Compose operations trait: bring up services from compose files.
// ABOUTME: Also owns build-cache pruning, which only the engine CLI exposes.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::ServiceName;

/// Whether `up` may build images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPolicy {
    /// Rebuild every service with a build context (`--build`).
    Always,
    /// Build only images that do not exist yet.
    IfMissing,
    /// Never build; images must exist (`--no-build`).
    Never,
}

/// One `docker compose up -d` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeUp {
    pub project: String,
    /// Directory compose runs in; `.env` is read from here.
    pub workdir: PathBuf,
    /// Compose files in merge order.
    pub files: Vec<PathBuf>,
    /// Services to start; empty means all.
    pub services: Vec<ServiceName>,
    pub build: BuildPolicy,
    /// Do not start linked services.
    pub no_deps: bool,
}

impl ComposeUp {
    /// Command-line arguments after `docker`.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-p".to_string(),
            self.project.clone(),
        ];
        for file in &self.files {
            args.push("-f".to_string());
            args.push(file.to_string_lossy().into_owned());
        }
        args.push("up".to_string());
        args.push("-d".to_string());
        match self.build {
            BuildPolicy::Always => args.push("--build".to_string()),
            BuildPolicy::Never => args.push("--no-build".to_string()),
            BuildPolicy::IfMissing => {}
        }
        if self.no_deps {
            args.push("--no-deps".to_string());
        }
        args.extend(self.services.iter().map(|s| s.to_string()));
        args
    }
}

#[async_trait]
pub trait ComposeOps: Send + Sync {
    /// Build (per policy) and start services in the background.
    async fn compose_up(&self, request: &ComposeUp) -> Result<(), ComposeError>;

    /// Remove build cache entries older than `older_than`.
    async fn prune_build_cache(&self, older_than: Duration) -> Result<(), ComposeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("failed to run docker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("docker {command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}
