// ABOUTME: Per-project deployment settings read from mushak.yaml.
// ABOUTME: Missing files fall back to documented defaults; malformed files are rejected whole.

mod deserialize;
mod target;

pub use target::{DeployTarget, PushRef, PushRefError, TargetError, parse_domain};

use crate::types::ServiceName;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use deserialize::{deserialize_attempts, deserialize_service_name_opt, deserialize_service_names};

pub const CONFIG_FILENAME: &str = "mushak.yaml";
pub const CONFIG_FILENAME_ALT: &str = "mushak.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Effective deployment settings for one project checkout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Port the primary service listens on inside its container.
    #[serde(default = "default_internal_port")]
    pub internal_port: u16,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Number of one-second health probe attempts. Never zero.
    #[serde(
        default = "default_health_timeout",
        deserialize_with = "deserialize_attempts"
    )]
    pub health_timeout: u32,

    /// Explicit primary application service.
    #[serde(default, deserialize_with = "deserialize_service_name_opt")]
    pub service_name: Option<ServiceName>,

    /// Services always treated as infrastructure, whatever their image.
    #[serde(default, deserialize_with = "deserialize_service_names")]
    pub persistent_services: Vec<ServiceName>,

    /// Build cache and dangling layers older than this are pruned.
    #[serde(default = "default_cache_limit", with = "humantime_serde")]
    pub cache_limit: Duration,

    /// Revision-tagged images retained for rollback.
    #[serde(default = "default_keep_images")]
    pub keep_images: usize,
}

fn default_internal_port() -> u16 {
    80
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_health_timeout() -> u32 {
    30
}

fn default_cache_limit() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_keep_images() -> usize {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            internal_port: default_internal_port(),
            health_path: default_health_path(),
            health_timeout: default_health_timeout(),
            service_name: None,
            persistent_services: Vec::new(),
            cache_limit: default_cache_limit(),
            keep_images: default_keep_images(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes as null, which a struct rejects.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(yaml)?;
        if !config.health_path.starts_with('/') {
            config.health_path.insert(0, '/');
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `mushak.yaml` (or `mushak.yml`) from a checkout, or defaults if absent.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        for name in [CONFIG_FILENAME, CONFIG_FILENAME_ALT] {
            let path = dir.join(name);
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading project config");
                return Self::load(&path);
            }
        }
        tracing::debug!(dir = %dir.display(), "no project config, using defaults");
        Ok(Self::default())
    }
}
