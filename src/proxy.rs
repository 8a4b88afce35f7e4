// ABOUTME: Caddy route management for deployed apps.
// ABOUTME: Writes one route file per app atomically and reloads Caddy with a fallback command.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

use crate::layout::Layout;
use crate::types::AppName;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("proxy reload failed: {primary}; fallback: {fallback}")]
    Reload { primary: String, fallback: String },
}

/// Render the route block for one app.
pub fn render_route(domain: &str, port: u16) -> String {
    format!("{domain} {{\n\treverse_proxy localhost:{port}\n}}\n")
}

/// Asks the running proxy to pick up configuration changes.
#[async_trait]
pub trait ProxyReload: Send + Sync {
    async fn reload(&self) -> Result<(), ProxyError>;
}

/// A command line run to reload the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ReloadCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    async fn run(&self) -> Result<(), String> {
        tracing::debug!(program = %self.program, args = ?self.args, "reloading proxy");
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| format!("{}: {}", self.program, e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

impl std::fmt::Display for ReloadCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Reload Caddy through systemd, falling back to the caddy CLI.
#[derive(Debug, Clone)]
pub struct CaddyReload {
    primary: ReloadCommand,
    fallback: ReloadCommand,
}

impl CaddyReload {
    pub fn new(caddyfile: &Path) -> Self {
        let config = caddyfile.to_string_lossy();
        Self {
            primary: ReloadCommand::new("systemctl", &["reload", "caddy"]),
            fallback: ReloadCommand::new("caddy", &["reload", "--config", &config]),
        }
    }

    pub fn commands(&self) -> (&ReloadCommand, &ReloadCommand) {
        (&self.primary, &self.fallback)
    }
}

#[async_trait]
impl ProxyReload for CaddyReload {
    async fn reload(&self) -> Result<(), ProxyError> {
        let primary = match self.primary.run().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        tracing::warn!("{} failed, trying {}: {}", self.primary, self.fallback, primary);

        self.fallback
            .run()
            .await
            .map_err(|fallback| ProxyError::Reload { primary, fallback })
    }
}

/// Owns the per-app route files and the top-level import.
pub struct ProxyManager {
    routes_dir: PathBuf,
    caddyfile: PathBuf,
    reloader: Box<dyn ProxyReload>,
}

impl ProxyManager {
    pub fn new(layout: &Layout, reloader: Box<dyn ProxyReload>) -> Self {
        Self {
            routes_dir: layout.routes_dir.clone(),
            caddyfile: layout.caddyfile.clone(),
            reloader,
        }
    }

    /// Caddy for the given layout, reloaded through systemd or the caddy CLI.
    pub fn caddy(layout: &Layout) -> Self {
        Self::new(layout, Box::new(CaddyReload::new(&layout.caddyfile)))
    }

    pub fn route_path(&self, app: &AppName) -> PathBuf {
        self.routes_dir.join(format!("{}.caddy", app))
    }

    /// Current route file contents, if any.
    pub fn read_route(&self, app: &AppName) -> Option<String> {
        std::fs::read_to_string(self.route_path(app)).ok()
    }

    /// Point `domain` at `localhost:port` and reload.
    ///
    /// When the reload fails the previous route file is put back, so the
    /// proxy configuration on disk keeps matching what the proxy serves.
    pub async fn set_route(&self, app: &AppName, domain: &str, port: u16) -> Result<(), ProxyError> {
        let path = self.route_path(app);
        let previous = self.read_route(app);

        write_atomic(&path, &render_route(domain, port))?;
        tracing::info!(app = %app, domain, port, "route written");

        if let Err(e) = self.reloader.reload().await {
            let restored = match &previous {
                Some(content) => write_atomic(&path, content),
                None => remove_if_exists(&path),
            };
            if let Err(restore) = restored {
                tracing::warn!("failed to restore previous route for {}: {}", app, restore);
            }
            return Err(e);
        }

        Ok(())
    }

    /// Delete the app's route and reload.
    pub async fn remove_route(&self, app: &AppName) -> Result<(), ProxyError> {
        let path = self.route_path(app);
        remove_if_exists(&path)?;
        self.reloader.reload().await
    }

    pub async fn reload(&self) -> Result<(), ProxyError> {
        self.reloader.reload().await
    }

    /// Make the top-level Caddyfile import every per-app route.
    ///
    /// An existing Caddyfile without the import is saved as `Caddyfile.backup`
    /// before being replaced. Returns true if anything changed.
    pub fn ensure_root_config(&self) -> Result<bool, ProxyError> {
        std::fs::create_dir_all(&self.routes_dir).map_err(|source| ProxyError::Write {
            path: self.routes_dir.clone(),
            source,
        })?;

        let import = format!("import {}/*.caddy", self.routes_dir.display());

        if let Ok(existing) = std::fs::read_to_string(&self.caddyfile) {
            if existing.lines().any(|line| line.trim() == import) {
                return Ok(false);
            }
            let backup = self.caddyfile.with_file_name("Caddyfile.backup");
            std::fs::copy(&self.caddyfile, &backup).map_err(|source| ProxyError::Write {
                path: backup.clone(),
                source,
            })?;
            tracing::info!(backup = %backup.display(), "saved existing Caddyfile");
        }

        write_atomic(&self.caddyfile, &format!("{import}\n"))?;
        Ok(true)
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), ProxyError> {
    let err = |source| ProxyError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(err)?;
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    std::fs::write(&tmp, content).map_err(err)?;
    std::fs::rename(&tmp, path).map_err(err)
}

fn remove_if_exists(path: &Path) -> Result<(), ProxyError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ProxyError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}
