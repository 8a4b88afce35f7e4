// ABOUTME: Lists restorable versions and restores one from its cached image.
// ABOUTME: Rollback reuses the deployment state machine with a cached start instead of a build.

use crate::config::DeployTarget;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::naming::Role;
use crate::registry::{Manifest, ReleaseMethod, checkouts, images};
use crate::runtime::{ContainerFilters, Runtime};
use crate::shutdown::Shutdown;
use crate::types::{AppName, Revision};

use super::Deployment;
use super::cleanup::release_of;
use super::error::DeployError;
use super::host::Host;
use super::pipeline::{DeploySummary, go_live, prepare, start_or_cancel};
use super::stage::{Reporter, Stage};

/// One restorable release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub revision: Revision,
    pub timestamp: String,
    pub port: Option<u16>,
    pub method: ReleaseMethod,
    pub has_image: bool,
    pub has_checkout: bool,
    pub is_current: bool,
}

/// Revision of the live primary container, else the `current` pointer.
pub async fn current_release<R: Runtime>(host: &Host<R>, app: &AppName) -> Option<Revision> {
    let filters = ContainerFilters::for_app(app, false)
        .role(Role::Application)
        .primary();

    match host.runtime.list_containers(&filters).await {
        Ok(containers) => {
            if let Some(revision) = containers.iter().find_map(|c| release_of(app, c)) {
                return Some(revision);
            }
        }
        Err(e) => tracing::debug!("could not list primary containers: {}", e),
    }

    checkouts::current_revision(&host.layout, app)
}

/// Manifest entries that still have an image, newest first.
pub async fn list_versions<R: Runtime>(
    host: &Host<R>,
    app: &AppName,
) -> std::result::Result<Vec<Version>, DeployError> {
    let history = Manifest::at(host.layout.manifest_path(app)).history()?;
    let tagged = images::revisions_with_images(&host.runtime, app).await?;
    let current = current_release(host, app).await;

    Ok(history
        .into_iter()
        .filter(|release| tagged.contains(&release.revision))
        .map(|release| Version {
            has_checkout: checkouts::has_checkout(&host.layout, app, &release.revision),
            is_current: current.as_ref() == Some(&release.revision),
            has_image: true,
            revision: release.revision,
            timestamp: release.timestamp,
            port: release.port,
            method: release.method,
        })
        .collect())
}

/// Restore `revision` from its tagged image.
///
/// The target is validated before anything changes. A failed health check
/// removes the rollback's containers; the serving release was never touched.
pub async fn rollback<R: Runtime>(
    host: &Host<R>,
    target: &DeployTarget,
    revision: &str,
    shutdown: &Shutdown,
    reporter: &dyn Reporter,
    diag: &mut Diagnostics,
) -> Result<DeploySummary> {
    let app = &target.app;
    // The manifest records short revisions; a full hash names the same one.
    let revision = Revision::abbreviate(revision)
        .map_err(|e| DeployError::rollback_target(revision.trim(), e.to_string()))?;

    let versions = list_versions(host, app).await?;
    let Some(version) = versions.iter().find(|v| v.revision == revision) else {
        return Err(DeployError::not_restorable(&revision).into());
    };
    if version.is_current {
        return Err(DeployError::rollback_target(revision.as_str(), "already serving").into());
    }
    if !version.has_checkout {
        reporter.note("checkout was pruned, restoring it from the repository");
    }

    let deployment = Deployment::for_rollback(target.clone(), revision);
    let deployment = prepare(deployment, host, reporter, diag).await?;

    reporter.stage(Stage::StartCached);
    let identity = deployment.identity().clone();
    let deployment = start_or_cancel(
        host,
        &identity,
        deployment.start_cached(host),
        shutdown,
        Stage::StartCached,
    )
    .await?;

    go_live(deployment, host, shutdown, reporter, diag).await
}
