// ABOUTME: Error types for deployment and rollback operations.
// ABOUTME: One variant per failure class, with a kind() for programmatic handling.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::classify::ClassifyError;
use crate::compose::DefinitionError;
use crate::config::ConfigError;
use crate::ports::PortError;
use crate::proxy::ProxyError;
use crate::registry::ManifestError;
use crate::runtime::{ComposeError, ContainerError, ImageError, NetworkError};
use crate::source::SourceError;
use crate::types::Revision;

/// Errors that can occur during deployment state transitions.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The project's mushak.yaml could not be read; nothing was applied.
    #[error(transparent)]
    ConfigParse(#[from] ConfigError),

    /// No free host port in the allocation range.
    #[error(transparent)]
    PortExhaustion(#[from] PortError),

    /// The pushed revision could not be resolved or materialized.
    #[error("checkout failed: {0}")]
    Checkout(#[from] SourceError),

    /// The checkout has no usable compose file or Dockerfile.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("service classification failed: {0}")]
    Classification(#[from] ClassifyError),

    /// Building or starting containers failed.
    #[error("build failed: {0}")]
    BuildFailure(String),

    #[error("health check failed after {attempts} attempts")]
    HealthCheckFailed { attempts: u32 },

    #[error("interrupted during health check after {attempts} attempts")]
    Interrupted { attempts: u32 },

    #[error("interrupted while building and starting the release")]
    InterruptedStart,

    /// A build deploy of the revision already serving would replace the live
    /// containers in place.
    #[error("{revision} is already serving; push a new commit to redeploy")]
    AlreadyServing { revision: Revision },

    /// Route file written but neither reload mechanism succeeded.
    #[error("proxy reload failed: {0}")]
    ProxyReloadFailed(#[from] ProxyError),

    /// Requested rollback target cannot be restored.
    #[error("cannot roll back to {revision}: {reason}")]
    RollbackTargetInvalid { revision: String, reason: String },

    /// Another deployment of the same app is in progress.
    #[error("deploy lock held by {holder} (pid {pid}) since {started_at}")]
    LockHeld {
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("lock error: {0}")]
    Lock(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("failed to write {path}: {source}")]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("container operation failed: {0}")]
    Container(#[from] ContainerError),

    #[error("image operation failed: {0}")]
    Image(#[from] ImageError),

    #[error("failed to create network: {0}")]
    Network(#[from] NetworkError),
}

/// Coarse classification of a [`DeployError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Configuration,
    Resources,
    Source,
    Build,
    Health,
    Interrupted,
    Proxy,
    InvalidTarget,
    Locked,
    Storage,
    Runtime,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::ConfigParse(_)
            | DeployError::Definition(_)
            | DeployError::Classification(_) => DeployErrorKind::Configuration,
            DeployError::PortExhaustion(_) => DeployErrorKind::Resources,
            DeployError::Checkout(_) => DeployErrorKind::Source,
            DeployError::BuildFailure(_) => DeployErrorKind::Build,
            DeployError::HealthCheckFailed { .. } => DeployErrorKind::Health,
            DeployError::Interrupted { .. } | DeployError::InterruptedStart => {
                DeployErrorKind::Interrupted
            }
            DeployError::ProxyReloadFailed(_) => DeployErrorKind::Proxy,
            DeployError::RollbackTargetInvalid { .. } | DeployError::AlreadyServing { .. } => {
                DeployErrorKind::InvalidTarget
            }
            DeployError::LockHeld { .. } | DeployError::Lock(_) => DeployErrorKind::Locked,
            DeployError::Manifest(_) | DeployError::Filesystem { .. } => DeployErrorKind::Storage,
            DeployError::Container(_) | DeployError::Image(_) | DeployError::Network(_) => {
                DeployErrorKind::Runtime
            }
        }
    }

    pub fn rollback_target(revision: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::RollbackTargetInvalid {
            revision: revision.into(),
            reason: reason.into(),
        }
    }

    pub fn not_restorable(revision: &Revision) -> Self {
        Self::rollback_target(revision.as_str(), "no image is tagged for this revision")
    }

    pub fn lock_held(holder: String, pid: u32, started_at: DateTime<Utc>) -> Self {
        DeployError::LockHeld {
            holder,
            pid,
            started_at,
        }
    }

    pub fn lock_error(message: impl Into<String>) -> Self {
        DeployError::Lock(message.into())
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<ComposeError> for DeployError {
    fn from(err: ComposeError) -> Self {
        DeployError::BuildFailure(err.to_string())
    }
}
