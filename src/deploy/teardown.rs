// ABOUTME: Removes everything the engine runs for an app.
// ABOUTME: Containers of every role are stopped and removed; volumes and files stay.

use crate::diagnostics::{Diagnostics, Warning};
use crate::runtime::{ContainerFilters, Runtime};
use crate::types::AppName;

use super::cleanup;
use super::error::DeployError;
use super::host::Host;

/// What `destroy` removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Teardown {
    pub containers_removed: usize,
}

/// Stop and remove all managed containers of `app` and drop its route.
pub async fn destroy<R: Runtime>(
    host: &Host<R>,
    app: &AppName,
    diag: &mut Diagnostics,
) -> Result<Teardown, DeployError> {
    let ids: Vec<_> = host
        .runtime
        .list_containers(&ContainerFilters::for_app(app, true))
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    let result = cleanup::remove_containers(&host.runtime, &ids, host.stop_timeout).await;
    for failure in &result.failed {
        diag.warn(Warning::container_cleanup(format!(
            "failed to remove {}: {}",
            failure.container_id, failure.error
        )));
    }

    host.proxy.remove_route(app).await?;
    tracing::info!(app = %app, removed = result.removed.len(), "app torn down");

    Ok(Teardown {
        containers_removed: result.removed.len(),
    })
}
