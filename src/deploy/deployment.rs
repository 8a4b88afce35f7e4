// ABOUTME: Generic deployment struct parameterized by state.
// ABOUTME: State types carry their own data for compile-time guarantees.

use crate::config::DeployTarget;
use crate::registry::ReleaseMethod;
use crate::types::{AppName, Revision};

use super::identity::ReleaseIdentity;
use super::state::{
    BranchValidated, Classified, CutOver, HealthChecked, Initialized, Loaded, Started,
};

/// A deployment in progress, parameterized by its current state.
///
/// The state type parameter `S` carries what earlier stages produced, so a
/// transition can only run once the data it depends on exists:
///
/// ```compile_fail
/// use mushak::config::DeployTarget;
/// use mushak::deploy::{Deployment, Host};
/// use mushak::runtime::BollardRuntime;
///
/// async fn skip_ahead(host: &Host<BollardRuntime>) {
///     let target = DeployTarget::new("shop", "shop.example.com", "main").unwrap();
///     let mut diag = mushak::diagnostics::Diagnostics::default();
///     let _ = Deployment::new(target).cutover(host, &mut diag).await;
/// }
/// ```
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) target: DeployTarget,
    pub(crate) method: ReleaseMethod,
    pub(crate) state: S,
}

impl Deployment<Initialized> {
    /// Start a build-and-deploy of a pushed revision.
    pub fn new(target: DeployTarget) -> Self {
        Deployment {
            target,
            method: ReleaseMethod::Build,
            state: Initialized,
        }
    }
}

impl Deployment<BranchValidated> {
    /// Start a rollback to an already validated revision.
    pub fn for_rollback(target: DeployTarget, revision: Revision) -> Self {
        Deployment {
            target,
            method: ReleaseMethod::Rollback,
            state: BranchValidated { revision },
        }
    }

    pub fn revision(&self) -> &Revision {
        &self.state.revision
    }
}

impl<S> Deployment<S> {
    pub fn app(&self) -> &AppName {
        &self.target.app
    }

    pub fn target(&self) -> &DeployTarget {
        &self.target
    }

    pub fn method(&self) -> &ReleaseMethod {
        &self.method
    }
}

impl Deployment<Classified> {
    pub fn identity(&self) -> &ReleaseIdentity {
        &self.state.identity
    }

    pub fn loaded(&self) -> &Loaded {
        &self.state.loaded
    }
}

impl Deployment<Started> {
    pub fn identity(&self) -> &ReleaseIdentity {
        &self.state.identity
    }

    pub fn port(&self) -> u16 {
        self.state.loaded.staging.port
    }
}

impl Deployment<HealthChecked> {
    pub fn identity(&self) -> &ReleaseIdentity {
        &self.state.identity
    }

    pub fn attempts(&self) -> u32 {
        self.state.attempts
    }
}

impl Deployment<CutOver> {
    /// Revision that was serving before this cutover.
    pub fn previous(&self) -> Option<&Revision> {
        self.state.previous.as_ref()
    }
}
