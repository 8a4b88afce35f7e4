// ABOUTME: The machine a deployment runs on: container engine, filesystem layout, proxy, git.
// ABOUTME: Every side effect of a transition goes through one of these collaborators.

use std::time::Duration;

use crate::health::{HealthProbe, HttpProbe};
use crate::layout::Layout;
use crate::ports::PortAllocator;
use crate::proxy::ProxyManager;
use crate::runtime::{BollardRuntime, RuntimeError};
use crate::source::{GitRepositories, SourceControl};

/// Checkout directories kept besides the serving one.
pub const KEEP_CHECKOUTS: usize = 3;

/// Collaborators the transitions act through.
pub struct Host<R> {
    pub runtime: R,
    pub layout: Layout,
    pub ports: PortAllocator,
    pub probe: Box<dyn HealthProbe>,
    pub proxy: ProxyManager,
    pub source: Box<dyn SourceControl>,
    /// Pause between health probes.
    pub health_interval: Duration,
    /// Grace period when stopping retired containers.
    pub stop_timeout: Duration,
}

impl<R> Host<R> {
    /// Host with the given runtime and the real port, probe, proxy and git collaborators.
    pub fn with_runtime(runtime: R, layout: Layout) -> Self {
        Self {
            proxy: ProxyManager::caddy(&layout),
            source: Box::new(GitRepositories::new(&layout.repos_root)),
            runtime,
            layout,
            ports: PortAllocator::system(),
            probe: Box::new(HttpProbe::default()),
            health_interval: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(10),
        }
    }
}

impl Host<BollardRuntime> {
    /// Connect to the local Docker daemon.
    pub async fn local(layout: Layout) -> Result<Self, RuntimeError> {
        let runtime = BollardRuntime::connect_local().await?;
        Ok(Self::with_runtime(runtime, layout))
    }
}
