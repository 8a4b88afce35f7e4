// ABOUTME: Deployment state types for the type state pattern.
// ABOUTME: Each state carries exactly the data the next transition needs.

use std::path::PathBuf;

use crate::compose::AppDefinition;
use crate::config::AppConfig;
use crate::types::Revision;

use super::identity::ReleaseIdentity;
use super::pipeline::DeploySummary;

/// Revision, port and checkout directory of the release being staged.
#[derive(Debug, Clone)]
pub struct Staging {
    pub revision: Revision,
    pub port: u16,
    pub checkout: PathBuf,
}

/// Staging plus everything read from the checkout.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub staging: Staging,
    pub config: AppConfig,
    pub definition: AppDefinition,
}

/// Initial state: trigger received.
/// Available actions: `validate_branch()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Branch matches and the revision is resolved.
/// Available actions: `allocate_port()`
#[derive(Debug, Clone)]
pub struct BranchValidated {
    pub(crate) revision: Revision,
}

/// Host port chosen for the new primary.
/// Available actions: `checkout()`
#[derive(Debug, Clone)]
pub struct PortAllocated {
    pub(crate) revision: Revision,
    pub(crate) port: u16,
}

/// Release directory materialized.
/// Available actions: `load_environment()`
#[derive(Debug, Clone)]
pub struct CheckedOut {
    pub(crate) staging: Staging,
}

/// Environment copied, project config and definition read.
/// Available actions: `classify()`
#[derive(Debug, Clone)]
pub struct EnvironmentLoaded {
    pub(crate) loaded: Loaded,
}

/// Services partitioned and release names minted.
/// Available actions: `build_and_start()`, `start_cached()`
#[derive(Debug, Clone)]
pub struct Classified {
    pub(crate) loaded: Loaded,
    pub(crate) identity: ReleaseIdentity,
}

/// New application containers running beside the old ones.
/// Available actions: `health_check()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Started {
    pub(crate) loaded: Loaded,
    pub(crate) identity: ReleaseIdentity,
}

/// New primary answered its health endpoint.
/// Available actions: `cutover()`, `rollback()`
#[derive(Debug, Clone)]
pub struct HealthChecked {
    pub(crate) loaded: Loaded,
    pub(crate) identity: ReleaseIdentity,
    pub(crate) attempts: u32,
}

/// Proxy and `current` point at the new release.
/// Available actions: `finalize()`
#[derive(Debug, Clone)]
pub struct CutOver {
    pub(crate) loaded: Loaded,
    pub(crate) identity: ReleaseIdentity,
    pub(crate) attempts: u32,
    pub(crate) previous: Option<Revision>,
}

/// Recorded in the manifest, old releases retired.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Completed {
    pub(crate) summary: DeploySummary,
}
