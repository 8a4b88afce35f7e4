// ABOUTME: Append-only deployment manifest stored as one text line per release event.
// ABOUTME: Format is "revision timestamp port method"; parsing tolerates missing trailing fields.

use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::Revision;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to append to manifest {path}: {source}")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// How a release came to be serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseMethod {
    Build,
    Rollback,
    /// Written by another tool version; kept verbatim.
    Other(String),
}

impl ReleaseMethod {
    fn parse(value: &str) -> Self {
        match value {
            "build" => ReleaseMethod::Build,
            "rollback" => ReleaseMethod::Rollback,
            other => ReleaseMethod::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ReleaseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseMethod::Build => f.write_str("build"),
            ReleaseMethod::Rollback => f.write_str("rollback"),
            ReleaseMethod::Other(other) => f.write_str(other),
        }
    }
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub revision: Revision,
    /// UTC time as written, usually `2024-05-01T12:00:00Z`.
    pub timestamp: String,
    pub port: Option<u16>,
    pub method: ReleaseMethod,
}

impl Release {
    pub fn new(revision: Revision, port: u16, method: ReleaseMethod, at: DateTime<Utc>) -> Self {
        Self {
            revision,
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            port: Some(port),
            method,
        }
    }

    /// Parse one line. Blank lines and lines without a valid revision yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let revision = Revision::new(fields.next()?).ok()?;
        let timestamp = fields.next().unwrap_or_default().to_string();
        let port = fields.next().and_then(|p| p.parse().ok());
        let method = fields
            .next()
            .map(ReleaseMethod::parse)
            .unwrap_or(ReleaseMethod::Build);

        Some(Self {
            revision,
            timestamp,
            port,
            method,
        })
    }

    pub fn to_line(&self) -> String {
        let port = self
            .port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("{} {} {} {}", self.revision, self.timestamp, port, self.method)
    }
}

/// Manifest file of one app.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
}

impl Manifest {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries in file order. A missing file is an empty history.
    pub fn read(&self) -> Result<Vec<Release>, ManifestError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ManifestError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let release = Release::parse_line(line);
                if release.is_none() {
                    tracing::warn!(line, "skipping unreadable manifest line");
                }
                release
            })
            .collect())
    }

    /// One entry per revision, the latest entry winning, newest first.
    pub fn history(&self) -> Result<Vec<Release>, ManifestError> {
        let entries = self.read()?;
        let mut seen = std::collections::HashSet::new();
        Ok(entries
            .into_iter()
            .rev()
            .filter(|release| seen.insert(release.revision.clone()))
            .collect())
    }

    /// Append one entry with a single write to an `O_APPEND` descriptor.
    pub fn append(&self, release: &Release) -> Result<(), ManifestError> {
        let err = |source| ManifestError::Append {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(err)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(err)?;

        let line = format!("{}\n", release.to_line());
        file.write_all(line.as_bytes()).map_err(err)?;
        tracing::info!(manifest = %self.path.display(), entry = %release.to_line(), "recorded release");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rev(s: &str) -> Revision {
        Revision::new(s).unwrap()
    }

    #[test]
    fn line_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let release = Release::new(rev("a1b2c3d"), 8042, ReleaseMethod::Build, at);
        assert_eq!(release.to_line(), "a1b2c3d 2024-05-01T12:00:00Z 8042 build");
    }

    #[test]
    fn parse_tolerates_missing_fields() {
        let release = Release::parse_line("a1b2c3d").unwrap();
        assert_eq!(release.timestamp, "");
        assert_eq!(release.port, None);
        assert_eq!(release.method, ReleaseMethod::Build);

        let release = Release::parse_line("a1b2c3d 2024-05-01T12:00:00Z").unwrap();
        assert_eq!(release.port, None);
    }

    #[test]
    fn unknown_method_is_kept() {
        let release = Release::parse_line("a1b2c3d 2024-05-01T12:00:00Z 8042 hotfix").unwrap();
        assert_eq!(release.method, ReleaseMethod::Other("hotfix".to_string()));
        assert_eq!(release.to_line(), "a1b2c3d 2024-05-01T12:00:00Z 8042 hotfix");
    }

    #[test]
    fn invalid_revision_is_skipped() {
        assert!(Release::parse_line("../x 2024 8042 build").is_none());
        assert!(Release::parse_line("   ").is_none());
    }

    #[test]
    fn history_keeps_latest_entry_per_revision() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::at(dir.path().join(".deployments"));
        std::fs::write(
            manifest.path(),
            "a1b2c3d 2024-05-01T12:00:00Z 8042 build\n\
             e4f5g6h 2024-05-02T12:00:00Z 8043 build\n",
        )
        .unwrap();

        let at = Utc.with_ymd_and_hms(2024, 5, 3, 12, 0, 0).unwrap();
        manifest
            .append(&Release::new(rev("a1b2c3d"), 8044, ReleaseMethod::Rollback, at))
            .unwrap();

        assert_eq!(manifest.read().unwrap().len(), 3);
        let history = manifest.history().unwrap();
        let revisions: Vec<_> = history.iter().map(|r| r.revision.as_str()).collect();
        assert_eq!(revisions, ["a1b2c3d", "e4f5g6h"]);
        assert_eq!(history[0].port, Some(8044));
        assert_eq!(history[0].method, ReleaseMethod::Rollback);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::at(dir.path().join(".deployments"));
        assert!(manifest.read().unwrap().is_empty());
    }
}
