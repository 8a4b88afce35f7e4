// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports state types, the pipeline entry points, rollback, teardown and the deploy lock.

mod cleanup;
mod deployment;
mod error;
mod host;
mod identity;
mod lock;
mod pipeline;
mod rollback;
mod stage;
mod state;
mod teardown;
mod transitions;

pub use cleanup::{
    CleanupFailure, CleanupResult, detect_stale_releases, release_of, remove_containers,
};
pub use deployment::Deployment;
pub use error::{DeployError, DeployErrorKind};
pub use host::{Host, KEEP_CHECKOUTS};
pub use identity::ReleaseIdentity;
pub use lock::{DeployLock, LockInfo};
pub use pipeline::{DeployOutcome, DeploySummary, deploy};
pub use rollback::{Version, current_release, list_versions, rollback};
pub use stage::{Reporter, Silent, Stage};
pub use state::{
    BranchValidated, CheckedOut, Classified, Completed, CutOver, EnvironmentLoaded, HealthChecked,
    Initialized, Loaded, PortAllocated, Staging, Started,
};
pub use teardown::{Teardown, destroy};
pub use transitions::TransitionResult;
