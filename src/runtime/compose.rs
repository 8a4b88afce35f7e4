// ABOUTME: Runs the docker CLI for operations bollard does not cover.
// ABOUTME: Compose up and build cache pruning, with stderr captured for error messages.

use std::path::Path;
use tokio::process::Command;

use super::traits::{ComposeError, ComposeUp};

/// The docker command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub async fn compose_up(&self, request: &ComposeUp) -> Result<(), ComposeError> {
        self.run(&request.args(), Some(&request.workdir)).await
    }

    pub async fn builder_prune(&self, until: &str) -> Result<(), ComposeError> {
        let args = [
            "builder".to_string(),
            "prune".to_string(),
            "-f".to_string(),
            "--filter".to_string(),
            format!("until={}", until),
        ];
        self.run(&args, None).await
    }

    async fn run(&self, args: &[String], workdir: Option<&Path>) -> Result<(), ComposeError> {
        tracing::debug!(program = %self.program, ?args, "running");

        let mut cmd = Command::new(&self.program);
        // A cancelled deploy drops this future; the CLI must not outlive it.
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        let output = cmd.output().await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // Compose prints build progress to stderr; the failure is at the end.
        let tail: Vec<&str> = stderr.lines().rev().take(20).collect();
        Err(ComposeError::Failed {
            command: args.iter().take(2).cloned().collect::<Vec<_>>().join(" "),
            status: output.status.to_string(),
            stderr: tail.into_iter().rev().collect::<Vec<_>>().join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let cli = DockerCli::new("mushak-no-such-docker");
        let err = cli.builder_prune("24h").await.unwrap_err();
        assert!(matches!(err, ComposeError::Spawn(_)));
    }

    #[tokio::test]
    async fn nonzero_exit_keeps_stderr() {
        let cli = DockerCli::new("sh");
        let args = vec![
            "-c".to_string(),
            "echo building >&2; echo boom >&2; exit 3".to_string(),
        ];
        let err = cli.run(&args, None).await.unwrap_err();
        match err {
            ComposeError::Failed { stderr, .. } => {
                assert!(stderr.ends_with("boom"), "stderr was {stderr:?}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
