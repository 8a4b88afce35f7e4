// ABOUTME: Detection and removal of application containers from other releases.
// ABOUTME: Retires everything but the serving revision once cutover succeeded.

use futures::future::join_all;
use std::time::Duration;

use crate::naming::{self, LABEL_REVISION, Role};
use crate::runtime::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
use crate::types::{AppName, ContainerId, Revision};

/// Application containers of `app` that belong to any revision except `keep`.
///
/// Includes stopped containers. Infrastructure is never returned.
pub async fn detect_stale_releases<R: ContainerOps>(
    runtime: &R,
    app: &AppName,
    keep: &Revision,
) -> Result<Vec<ContainerSummary>, ContainerError> {
    let filters = ContainerFilters::for_app(app, true).role(Role::Application);
    let containers = runtime.list_containers(&filters).await?;

    Ok(containers
        .into_iter()
        .filter(|c| release_of(app, c).as_ref() != Some(keep))
        .collect())
}

/// Revision a container belongs to, from its label or else its name.
pub fn release_of(app: &AppName, container: &ContainerSummary) -> Option<Revision> {
    container
        .label(LABEL_REVISION)
        .and_then(|r| Revision::new(r).ok())
        .or_else(|| naming::revision_from_name(app, &container.name))
}

/// One container that could not be removed.
#[derive(Debug, Clone)]
pub struct CleanupFailure {
    pub container_id: ContainerId,
    pub error: String,
}

/// Outcome of removing a batch of containers.
#[derive(Debug, Clone, Default)]
pub struct CleanupResult {
    pub removed: Vec<ContainerId>,
    pub failed: Vec<CleanupFailure>,
}

impl CleanupResult {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Stop then remove each container, concurrently. Volumes are kept.
pub async fn remove_containers<R: ContainerOps>(
    runtime: &R,
    containers: &[ContainerId],
    stop_timeout: Duration,
) -> CleanupResult {
    let outcomes = join_all(containers.iter().map(|id| async move {
        match runtime.stop_container(id, stop_timeout).await {
            Ok(()) | Err(ContainerError::NotRunning(_)) | Err(ContainerError::NotFound(_)) => {}
            Err(e) => tracing::debug!(container = %id, "stop failed, forcing removal: {}", e),
        }

        match runtime.remove_container(id, true).await {
            Ok(()) | Err(ContainerError::NotFound(_)) => Ok(id.clone()),
            Err(e) => Err(CleanupFailure {
                container_id: id.clone(),
                error: e.to_string(),
            }),
        }
    }))
    .await;

    let mut result = CleanupResult::default();
    for outcome in outcomes {
        match outcome {
            Ok(id) => result.removed.push(id),
            Err(failure) => result.failed.push(failure),
        }
    }
    result
}
