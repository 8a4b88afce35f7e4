// ABOUTME: Filesystem locations the engine reads and writes on the host.
// ABOUTME: Roots are configurable so the whole engine can run against a temp directory.

use std::path::{Path, PathBuf};

use crate::types::{AppName, Revision};

pub const DEFAULT_APPS_ROOT: &str = "/var/www";
pub const DEFAULT_ROUTES_DIR: &str = "/etc/caddy/apps";
pub const DEFAULT_CADDYFILE: &str = "/etc/caddy/Caddyfile";
pub const DEFAULT_REPOS_ROOT: &str = "/var/repo";

/// Name of the symlink pointing at the serving release's checkout.
pub const CURRENT_LINK: &str = "current";
pub const MANIFEST_FILE: &str = ".deployments";
pub const LOCK_FILE: &str = ".deploy.lock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub apps_root: PathBuf,
    pub routes_dir: PathBuf,
    pub caddyfile: PathBuf,
    pub repos_root: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            apps_root: PathBuf::from(DEFAULT_APPS_ROOT),
            routes_dir: PathBuf::from(DEFAULT_ROUTES_DIR),
            caddyfile: PathBuf::from(DEFAULT_CADDYFILE),
            repos_root: PathBuf::from(DEFAULT_REPOS_ROOT),
        }
    }
}

impl Layout {
    /// All roots under one directory; used by tests and local dry runs.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            apps_root: root.join("www"),
            routes_dir: root.join("caddy/apps"),
            caddyfile: root.join("caddy/Caddyfile"),
            repos_root: root.join("repo"),
        }
    }

    /// `/var/www/<app>`
    pub fn app_dir(&self, app: &AppName) -> PathBuf {
        self.apps_root.join(app.as_str())
    }

    /// `/var/www/<app>/<revision>`
    pub fn release_dir(&self, app: &AppName, revision: &Revision) -> PathBuf {
        self.app_dir(app).join(revision.as_str())
    }

    pub fn current_link(&self, app: &AppName) -> PathBuf {
        self.app_dir(app).join(CURRENT_LINK)
    }

    pub fn manifest_path(&self, app: &AppName) -> PathBuf {
        self.app_dir(app).join(MANIFEST_FILE)
    }

    pub fn lock_path(&self, app: &AppName) -> PathBuf {
        self.app_dir(app).join(LOCK_FILE)
    }

    pub fn env_prod_file(&self, app: &AppName) -> PathBuf {
        self.app_dir(app).join(".env.prod")
    }

    pub fn env_file(&self, app: &AppName) -> PathBuf {
        self.app_dir(app).join(".env")
    }

    /// `/etc/caddy/apps/<app>.caddy`
    pub fn route_path(&self, app: &AppName) -> PathBuf {
        self.routes_dir.join(format!("{}.caddy", app))
    }

    /// Bare repository the developer pushes to: `/var/repo/<app>.git`.
    pub fn repo_dir(&self, app: &AppName) -> PathBuf {
        self.repos_root.join(format!("{}.git", app))
    }
}
