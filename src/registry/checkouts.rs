// ABOUTME: Release checkout directories and the `current` symlink.
// ABOUTME: Atomic pointer switch via rename, and pruning of old release directories.

use std::path::Path;
use std::time::SystemTime;

use crate::layout::Layout;
use crate::types::{AppName, Revision};

/// Revision the `current` symlink points at, if any.
pub fn current_revision(layout: &Layout, app: &AppName) -> Option<Revision> {
    let target = std::fs::read_link(layout.current_link(app)).ok()?;
    let name = target.file_name()?.to_str()?;
    Revision::new(name).ok()
}

/// Point `current` at the release directory of `revision`.
///
/// A new link is created under a temporary name and renamed over the old
/// one, so readers always see either the old or the new target.
pub fn switch_current(layout: &Layout, app: &AppName, revision: &Revision) -> std::io::Result<()> {
    let link = layout.current_link(app);
    let tmp = layout
        .app_dir(app)
        .join(format!(".current.{}", std::process::id()));

    match std::fs::remove_file(&tmp) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    symlink(&layout.release_dir(app, revision), &tmp)?;
    std::fs::rename(&tmp, &link)?;
    tracing::info!(app = %app, revision = %revision, "current release switched");
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "release pointers need symlink support",
    ))
}

pub fn has_checkout(layout: &Layout, app: &AppName, revision: &Revision) -> bool {
    layout.release_dir(app, revision).is_dir()
}

/// Release directories (real directories named like a revision), newest first.
pub fn release_dirs(layout: &Layout, app: &AppName) -> std::io::Result<Vec<(Revision, SystemTime)>> {
    let entries = match std::fs::read_dir(layout.app_dir(app)) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !file_type.is_dir() {
            continue;
        }
        let Some(revision) = entry.file_name().to_str().and_then(|n| Revision::new(n).ok())
        else {
            continue;
        };
        let modified = entry.metadata()?.modified()?;
        dirs.push((revision, modified));
    }

    dirs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(dirs)
}

/// Delete release directories beyond the `keep` most recent.
///
/// Protected revisions are never deleted and do not count toward `keep`
/// unless they are among the most recent anyway. Returns the removed revisions.
pub fn prune_releases(
    layout: &Layout,
    app: &AppName,
    keep: usize,
    protected: &[&Revision],
) -> std::io::Result<Vec<Revision>> {
    let mut removed = Vec::new();
    for (revision, _) in release_dirs(layout, app)?.into_iter().skip(keep) {
        if protected.contains(&&revision) {
            continue;
        }
        std::fs::remove_dir_all(layout.release_dir(app, &revision))?;
        tracing::debug!(app = %app, revision = %revision, "removed old checkout");
        removed.push(revision);
    }
    Ok(removed)
}
