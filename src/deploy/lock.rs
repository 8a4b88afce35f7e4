// ABOUTME: Per-app deploy lock preventing concurrent deployments of the same app.
// ABOUTME: Atomic file creation in the app directory; lock info is stored as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::layout::Layout;
use crate::types::AppName;

use super::DeployError;

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// App being deployed.
    pub app: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(app: &AppName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            app: app.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }
}

/// A held deploy lock. Dropping it without `release` still removes the file.
pub struct DeployLock {
    path: PathBuf,
    app: AppName,
    released: bool,
}

impl std::fmt::Debug for DeployLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLock")
            .field("app", &self.app)
            .field("path", &self.path)
            .finish()
    }
}

impl DeployLock {
    /// Acquire the deploy lock of `app`.
    ///
    /// Uses `create_new` for atomic acquisition (no TOCTOU race). Stale locks
    /// (>1 hour) and unreadable lock files are broken with a warning; `force`
    /// breaks any lock.
    pub fn acquire(layout: &Layout, app: &AppName, force: bool) -> Result<Self, DeployError> {
        let path = layout.lock_path(app);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DeployError::lock_error(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let info = LockInfo::new(app);
        if Self::try_create(&path, &info)? {
            return Ok(Self::held(path, app));
        }

        if !Self::should_break(&path, force)? {
            return match Self::read(&path) {
                Some(existing) => Err(DeployError::lock_held(
                    existing.holder,
                    existing.pid,
                    existing.started_at,
                )),
                None => Err(DeployError::lock_error("lock held by another process")),
            };
        }

        tracing::debug!("Removing stale/forced lock at {}", path.display());
        let _ = std::fs::remove_file(&path);

        if !Self::try_create(&path, &info)? {
            return Err(DeployError::lock_error(
                "lock acquired by another process during break",
            ));
        }
        Ok(Self::held(path, app))
    }

    fn held(path: PathBuf, app: &AppName) -> Self {
        tracing::debug!(lock = %path.display(), "deploy lock acquired");
        Self {
            path,
            app: app.clone(),
            released: false,
        }
    }

    /// Returns false if the file already exists.
    fn try_create(path: &Path, info: &LockInfo) -> Result<bool, DeployError> {
        let json = serde_json::to_string(info)
            .map_err(|e| DeployError::lock_error(format!("failed to serialize lock: {}", e)))?;

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(DeployError::lock_error(format!(
                    "failed to acquire lock: {}",
                    e
                )));
            }
        };

        file.write_all(json.as_bytes())
            .map_err(|e| DeployError::lock_error(format!("failed to write lock: {}", e)))?;
        Ok(true)
    }

    fn read(path: &Path) -> Option<LockInfo> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Check if an existing lock should be broken (stale, forced, or corrupted).
    fn should_break(path: &Path, force: bool) -> Result<bool, DeployError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            // Released between our create attempt and this read.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                return Err(DeployError::lock_error(format!(
                    "failed to read lock info: {}",
                    e
                )));
            }
        };

        match serde_json::from_str::<LockInfo>(&content) {
            Ok(existing) => {
                if force {
                    tracing::warn!(
                        "Breaking lock held by {} (pid {}) since {}",
                        existing.holder,
                        existing.pid,
                        existing.started_at
                    );
                    Ok(true)
                } else if existing.is_stale() {
                    tracing::warn!(
                        "Auto-breaking stale lock held by {} (pid {}) since {}",
                        existing.holder,
                        existing.pid,
                        existing.started_at
                    );
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Err(_) => {
                tracing::warn!("Lock info corrupted, breaking lock");
                Ok(true)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock.
    pub fn release(mut self) -> Result<(), DeployError> {
        self.released = true;
        std::fs::remove_file(&self.path).map_err(|e| {
            DeployError::lock_error(format!(
                "failed to remove {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_info_creates_with_current_host_and_pid() {
        let app = AppName::new("shop").unwrap();
        let info = LockInfo::new(&app);

        assert_eq!(info.app, "shop");
        assert_eq!(info.pid, std::process::id());
        assert!(!info.holder.is_empty());
    }

    #[test]
    fn fresh_lock_is_not_stale() {
        let app = AppName::new("shop").unwrap();
        let info = LockInfo::new(&app);
        assert!(!info.is_stale());
    }

    #[test]
    fn old_lock_is_stale() {
        let app = AppName::new("shop").unwrap();
        let mut info = LockInfo::new(&app);
        info.started_at = Utc::now() - chrono::Duration::hours(2);
        assert!(info.is_stale());
    }
}
